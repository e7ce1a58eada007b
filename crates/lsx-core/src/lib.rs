//! lsx core library
//!
//! This library turns platform facts into a selected snapshot of open files:
//! - Mount table resolution (escape decoding, symlink and stat probing,
//!   supplement fallback, de-duplication)
//! - Filesystem probes, direct or bounded by a timeout
//! - Selection criteria, the selection store and the evaluator
//! - The gather pipeline that runs discovery through selection
//! - Structured logging
//!
//! Platform discovery of processes is supplied by the caller through the
//! [`Discovery`] trait.

pub mod context;
pub mod gather;
pub mod logging;
pub mod mount;
pub mod probe;
pub mod record;
pub mod select;
pub mod warnings;

pub use context::Context;
pub use gather::{
    Discovery, GatherMetadata, GatherResult, ProcessReport, StaticDiscovery, EXIT_FATAL,
};
pub use mount::{MountEntry, MountTable};
pub use record::{OpenFileRecord, ProcessInfo, ProcessRecord};
pub use select::{Category, PathFlags, SelectionStatus, SelectionStore, Selector};
pub use warnings::{Warning, WarningKind, Warnings};
