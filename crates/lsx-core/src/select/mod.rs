//! Selection: criteria, the store that groups them, and the evaluator.

pub mod criterion;
pub mod eval;
pub mod inet;
pub mod store;

pub use criterion::{
    BoundPath, Category, CommandPattern, Criterion, FdSelector, MountBinding, NumericRange,
    PathFlags, PathSelection, Selector, Subject,
};
pub use eval::evaluate;
pub use inet::{InetSpec, IpFamily};
pub use store::{SelectionStatus, SelectionStore};
