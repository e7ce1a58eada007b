//! Mount table resolution.
//!
//! Raw lines come from a [`MountSource`], are decoded and resolved by the
//! [`MountResolver`] into a [`MountTable`] that the context caches until
//! explicitly invalidated.

pub mod escape;
pub mod resolver;
pub mod source;
pub mod supplement;
pub mod table;

pub use escape::{decode_octal_escapes, decode_path, EscapeError};
pub use resolver::MountResolver;
pub use source::{MountSource, ProcMountSource, StaticMountSource};
pub use supplement::{Supplement, SupplementEntry, SupplementError, SupplementTable};
pub use table::{FsKind, MountEntry, MountTable, NfsPresence};
