//! Shared types for lsx.
//!
//! This crate provides foundational types used across all lsx components:
//! - Process and device identifiers
//! - The unified error type and its taxonomy

pub mod error;
pub mod id;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use id::{DeviceId, ProcessId};
