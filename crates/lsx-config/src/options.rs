//! Gather options: everything a caller configures before resolving mounts
//! and evaluating selections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::exempt::ExemptionList;
use crate::validate::ValidationError;

/// Default location of the kernel mount table.
pub const DEFAULT_MOUNTS_PATH: &str = "/proc/mounts";

/// Default timeout for an isolated blocking call.
pub const DEFAULT_BLOCKING_TIMEOUT_MS: u64 = 15_000;

/// Caller configuration for one lsx context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherOptions {
    /// Mount table to read.
    pub mounts_path: PathBuf,

    /// File systems whose mount points must not be stat'ed.
    pub exempt_filesystems: Vec<ExemptFsEntry>,

    /// Optional supplement file mapping mount points to device numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_supplement: Option<PathBuf>,

    /// Retain and log partial-failure warnings.
    pub warnings: bool,

    /// How blocking stat/readlink calls are made.
    pub blocking: BlockingOptions,

    /// Terminate the process on allocation failure instead of returning it.
    pub exit_on_fatal: bool,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            mounts_path: PathBuf::from(DEFAULT_MOUNTS_PATH),
            exempt_filesystems: Vec::new(),
            mount_supplement: None,
            warnings: false,
            blocking: BlockingOptions::default(),
            exit_on_fatal: false,
        }
    }
}

/// A file system exempted from stat, and optionally from readlink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptFsEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub avoid_readlink: bool,
}

/// Blocking-call policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockingOptions {
    /// Never stat or readlink mount points.
    pub avoid: bool,

    /// Run each blocking call on a worker with a timeout.
    pub isolate: bool,

    /// Per-call timeout in milliseconds when isolating.
    pub timeout_ms: u64,
}

impl Default for BlockingOptions {
    fn default() -> Self {
        Self {
            avoid: false,
            isolate: false,
            timeout_ms: DEFAULT_BLOCKING_TIMEOUT_MS,
        }
    }
}

impl GatherOptions {
    /// Load options from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_json(&content)
    }

    /// Parse options from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Validate semantic constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        crate::validate::validate_options(self)
    }

    /// Build the exemption list from `exempt_filesystems`.
    pub fn exemptions(&self) -> ExemptionList {
        let mut list = ExemptionList::new();
        for entry in &self.exempt_filesystems {
            list.exempt_fs(entry.path.clone(), entry.avoid_readlink);
        }
        list
    }

    /// Builder: exempt a file system from stat.
    pub fn with_exempt_fs(mut self, path: impl Into<PathBuf>, avoid_readlink: bool) -> Self {
        self.exempt_filesystems.push(ExemptFsEntry {
            path: path.into(),
            avoid_readlink,
        });
        self
    }

    /// Builder: set the supplement file.
    pub fn with_supplement(mut self, path: impl Into<PathBuf>) -> Self {
        self.mount_supplement = Some(path.into());
        self
    }

    /// Builder: enable warnings.
    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.warnings = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = GatherOptions::default();
        assert_eq!(opts.mounts_path, PathBuf::from("/proc/mounts"));
        assert!(!opts.warnings);
        assert!(!opts.blocking.avoid);
        assert_eq!(opts.blocking.timeout_ms, 15_000);
        assert!(opts.mount_supplement.is_none());
    }

    #[test]
    fn test_parse_partial_json_fills_defaults() {
        let opts = GatherOptions::parse_json(
            r#"{"warnings": true, "blocking": {"isolate": true},
                "exempt_filesystems": [{"path": "/net/stuck", "avoid_readlink": true}]}"#,
        )
        .unwrap();

        assert!(opts.warnings);
        assert!(opts.blocking.isolate);
        assert_eq!(opts.blocking.timeout_ms, DEFAULT_BLOCKING_TIMEOUT_MS);
        assert_eq!(opts.exempt_filesystems.len(), 1);
        assert!(opts.exempt_filesystems[0].avoid_readlink);
        assert_eq!(opts.mounts_path, PathBuf::from(DEFAULT_MOUNTS_PATH));
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        let err = GatherOptions::parse_json("{warnings: yes}").unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn test_exemptions_from_entries() {
        let opts = GatherOptions::default()
            .with_exempt_fs("/net/a", false)
            .with_exempt_fs("/net/b", true);
        let list = opts.exemptions();

        assert!(list.skips_stat("/net/a".as_ref()));
        assert!(!list.skips_readlink("/net/a".as_ref()));
        assert!(list.skips_readlink("/net/b".as_ref()));
        assert!(!list.skips_stat("/net".as_ref()));
    }
}
