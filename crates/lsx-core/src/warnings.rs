//! Partial-failure warnings.
//!
//! A single stat or readlink failing never aborts a pass; it becomes a
//! [`Warning`]. Warnings are opt-in: when disabled they are only traced at
//! debug level and not retained.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::logging::event_names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A mount line was dropped; output may be incomplete.
    MountIncomplete,
    StatFailed,
    ReadlinkFailed,
    /// The supplement file is unusable and has been disabled.
    SupplementCorrupt,
    /// A device number was taken from the supplement instead of stat.
    SupplementAssumed,
    ProbeTimeout,
    /// A selection path could not be resolved and will match literally.
    SelectionUnresolved,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningKind::MountIncomplete => "mount_incomplete",
            WarningKind::StatFailed => "stat_failed",
            WarningKind::ReadlinkFailed => "readlink_failed",
            WarningKind::SupplementCorrupt => "supplement_corrupt",
            WarningKind::SupplementAssumed => "supplement_assumed",
            WarningKind::ProbeTimeout => "probe_timeout",
            WarningKind::SelectionUnresolved => "selection_unresolved",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Warning sink owned by a context.
#[derive(Debug, Default)]
pub struct Warnings {
    enabled: bool,
    entries: Vec<Warning>,
}

impl Warnings {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, kind: WarningKind, message: impl Into<String>, path: Option<&Path>) {
        self.push(Warning {
            kind,
            message: message.into(),
            path: path.map(Path::to_path_buf),
        });
    }

    pub fn push(&mut self, warning: Warning) {
        if !self.enabled {
            debug!(kind = %warning.kind, "suppressed warning: {}", warning.message);
            return;
        }
        warn!(
            target: event_names::WARNING,
            kind = %warning.kind,
            path = ?warning.path,
            "{}",
            warning.message
        );
        self.entries.push(warning);
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand the retained warnings to the caller, leaving the sink empty.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.entries)
    }
}
