//! Stage and event vocabulary shared by every lsx log line.

use serde::{Deserialize, Serialize};

/// Log levels as they appear in JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Phases of a context's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Context creation.
    Init,
    /// Selection criteria being added.
    Configure,
    /// Mount table resolution.
    Mounts,
    /// Evaluating records against the selection store.
    Select,
    /// The gather pass as a whole.
    Gather,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Configure => "configure",
            Stage::Mounts => "mounts",
            Stage::Select => "select",
            Stage::Gather => "gather",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names, used as tracing targets.
pub mod event_names {
    // Context lifecycle
    pub const CONTEXT_CREATED: &str = "context.created";
    pub const CONTEXT_FROZEN: &str = "context.frozen";

    // Mount resolution
    pub const MOUNTS_STARTED: &str = "mounts.started";
    pub const MOUNTS_LINE_SKIPPED: &str = "mounts.line_skipped";
    pub const MOUNTS_ROOT_REPLACED: &str = "mounts.root_replaced";
    pub const MOUNTS_CACHED: &str = "mounts.cached";
    pub const MOUNTS_FINISHED: &str = "mounts.finished";
    pub const MOUNTS_INVALIDATED: &str = "mounts.invalidated";

    // Supplement
    pub const SUPPLEMENT_LOADED: &str = "supplement.loaded";
    pub const SUPPLEMENT_DISABLED: &str = "supplement.disabled";

    // Probes
    pub const PROBE_TIMED_OUT: &str = "probe.timed_out";

    // Selection
    pub const SELECT_ADDED: &str = "select.added";
    pub const SELECT_REJECTED: &str = "select.rejected";

    // Gather
    pub const GATHER_STARTED: &str = "gather.started";
    pub const GATHER_FINISHED: &str = "gather.finished";

    // Warnings surfaced to the caller
    pub const WARNING: &str = "warning";

    // Errors
    pub const FATAL: &str = "fatal";
}
