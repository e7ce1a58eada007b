//! Per-path stat/readlink exemptions.
//!
//! Matching is by exact path only; an exemption on `/net` says nothing
//! about `/net/home`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Which blocking calls to skip for one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exemption {
    pub skip_stat: bool,
    pub skip_readlink: bool,
}

impl Exemption {
    pub const NONE: Exemption = Exemption {
        skip_stat: false,
        skip_readlink: false,
    };

    pub const FULL: Exemption = Exemption {
        skip_stat: true,
        skip_readlink: true,
    };
}

/// Exemption lookup keyed by path.
#[derive(Debug, Clone, Default)]
pub struct ExemptionList {
    entries: HashMap<PathBuf, Exemption>,
}

impl ExemptionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exempt a file system: stat is always skipped, readlink optionally.
    pub fn exempt_fs(&mut self, path: impl Into<PathBuf>, avoid_readlink: bool) {
        let entry = self.entries.entry(path.into()).or_default();
        entry.skip_stat = true;
        entry.skip_readlink |= avoid_readlink;
    }

    /// Insert an arbitrary flag combination, replacing any previous one.
    pub fn insert(&mut self, path: impl Into<PathBuf>, exemption: Exemption) {
        self.entries.insert(path.into(), exemption);
    }

    pub fn get(&self, path: &Path) -> Exemption {
        self.entries.get(path).copied().unwrap_or(Exemption::NONE)
    }

    pub fn skips_stat(&self, path: &Path) -> bool {
        self.get(path).skip_stat
    }

    pub fn skips_readlink(&self, path: &Path) -> bool {
        self.get(path).skip_readlink
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
