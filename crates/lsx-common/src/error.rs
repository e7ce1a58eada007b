//! Error types for lsx.
//!
//! Every fallible lsx operation returns [`Result`]. Errors carry:
//! - A stable numeric code for machine parsing
//! - A category matching the library's failure taxonomy
//! - Recoverability and fatality hints for callers
//! - A remediation hint for humans
//!
//! # Taxonomy
//!
//! | Category     | Meaning                                                     |
//! |--------------|-------------------------------------------------------------|
//! | `allocation` | A buffer could not grow; fatal to the current operation only |
//! | `config`     | Rejected synchronously by the call that caused it           |
//! | `discovery`  | A whole collaborator source failed (not a single entry)     |
//! | `supplement` | The mount supplement file is unusable                       |
//! | `io`         | File and serialization errors                               |
//! | `platform`   | Operation unsupported on this platform                      |
//!
//! Per-entry failures during mount resolution or gathering (a single stat or
//! readlink) are never errors; they surface as warnings on the context.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for lsx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Memory could not be allocated.
    Allocation,
    /// Invalid configuration or selection arguments.
    Config,
    /// Mount table or process discovery failure.
    Discovery,
    /// Mount supplement file problems.
    Supplement,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Allocation => write!(f, "allocation"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Discovery => write!(f, "discovery"),
            ErrorCategory::Supplement => write!(f, "supplement"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for lsx.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("selection store is frozen")]
    Frozen,

    #[error("context is not frozen")]
    NotFrozen,

    #[error("cannot mix inclusion and exclusion in {category} selections")]
    MixedExclusion { category: String },

    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid internet address: {0}")]
    InvalidAddress(String),

    // Allocation errors (20-29)
    #[error("cannot allocate memory: {0}")]
    NoMemory(String),

    // Discovery errors (30-39)
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("lookup of {path} timed out after {millis}ms")]
    Timeout { path: String, millis: u64 },

    // Supplement errors (40-49)
    #[error("mount supplement line {line}: {reason}")]
    SupplementCorrupt { line: usize, reason: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Allocation errors
    /// - 30-39: Discovery errors
    /// - 40-49: Supplement errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidArgument(_) => 10,
            Error::Frozen => 11,
            Error::NotFrozen => 12,
            Error::MixedExclusion { .. } => 13,
            Error::InvalidPattern { .. } => 14,
            Error::InvalidAddress(_) => 15,
            Error::NoMemory(_) => 20,
            Error::Discovery(_) => 30,
            Error::Timeout { .. } => 31,
            Error::SupplementCorrupt { .. } => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidArgument(_)
            | Error::Frozen
            | Error::NotFrozen
            | Error::MixedExclusion { .. }
            | Error::InvalidPattern { .. }
            | Error::InvalidAddress(_) => ErrorCategory::Config,

            Error::NoMemory(_) => ErrorCategory::Allocation,

            Error::Discovery(_) | Error::Timeout { .. } => ErrorCategory::Discovery,

            Error::SupplementCorrupt { .. } => ErrorCategory::Supplement,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Config: the caller fixes its arguments and retries
            Error::InvalidArgument(_)
            | Error::MixedExclusion { .. }
            | Error::InvalidPattern { .. }
            | Error::InvalidAddress(_) => true,
            Error::Frozen => false,
            Error::NotFrozen => true,

            Error::NoMemory(_) => false,

            // Discovery: mostly transient
            Error::Discovery(_) => true,
            Error::Timeout { .. } => true,

            Error::SupplementCorrupt { .. } => true,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Whether a caller that asked for exit-on-fatal should terminate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::NoMemory(_))
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "Check the selection or option value that was rejected.",
            Error::Frozen => {
                "Add every selection before freezing the context; create a new context to change them."
            }
            Error::NotFrozen => "Call freeze() on the context before gathering.",
            Error::MixedExclusion { .. } => {
                "Use either only inclusions or only exclusions for file descriptor selections."
            }
            Error::InvalidPattern { .. } => {
                "Command regexes are written /pattern/ with optional b, i or x modifiers."
            }
            Error::InvalidAddress(_) => {
                "Internet selections are written [46][protocol][@host][:port[-port]]."
            }
            Error::NoMemory(_) => "The system is out of memory. Retry with fewer selections.",
            Error::Discovery(_) => {
                "Retry the gather. If persistent, check /proc permissions and system load."
            }
            Error::Timeout { .. } => {
                "A file system did not answer in time. Exempt it or raise the blocking timeout."
            }
            Error::SupplementCorrupt { .. } => {
                "Regenerate the mount supplement file from a privileged run."
            }
            Error::Io(_) => "Check file permissions and disk space.",
            Error::Json(_) => "Check the configuration file for JSON syntax errors.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "Invalid Argument",
            Error::Frozen => "Context Frozen",
            Error::NotFrozen => "Context Not Frozen",
            Error::MixedExclusion { .. } => "Mixed Inclusion And Exclusion",
            Error::InvalidPattern { .. } => "Invalid Pattern",
            Error::InvalidAddress(_) => "Invalid Internet Address",
            Error::NoMemory(_) => "Out Of Memory",
            Error::Discovery(_) => "Discovery Error",
            Error::Timeout { .. } => "Lookup Timeout",
            Error::SupplementCorrupt { .. } => "Corrupt Mount Supplement",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., path, line).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::MixedExclusion { category } => {
                context.insert("category".to_string(), serde_json::json!(category));
            }
            Error::InvalidPattern { pattern, .. } => {
                context.insert("pattern".to_string(), serde_json::json!(pattern));
            }
            Error::Timeout { path, millis } => {
                context.insert("path".to_string(), serde_json::json!(path));
                context.insert("timeout_ms".to_string(), serde_json::json!(millis));
            }
            Error::SupplementCorrupt { line, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
