//! lsx configuration loading and validation.
//!
//! This crate provides:
//! - Typed gather options (`GatherOptions`) loaded from JSON
//! - The per-path stat/readlink exemption list
//! - Config resolution (CLI → env → XDG → /etc → defaults)
//! - Semantic validation

pub mod exempt;
pub mod options;
pub mod resolve;
pub mod validate;

pub use exempt::{Exemption, ExemptionList};
pub use options::{BlockingOptions, ExemptFsEntry, GatherOptions};
pub use resolve::{load_options, resolve_config, ConfigPath, ConfigSource};
pub use validate::{validate_options, ValidationError, ValidationResult};
