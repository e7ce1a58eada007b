//! The selection store: criteria grouped by category plus the AND/OR mode
//! and the frozen flag.

use serde::Serialize;
use std::collections::BTreeMap;

use lsx_common::{Error, Result};
use tracing::debug;

use super::criterion::{
    BoundPath, Category, Criterion, MountBinding, PathSelection, Selector,
};
use crate::logging::event_names;
use crate::mount::MountTable;
use crate::probe::{FileStat, FsProbe};
use crate::warnings::{WarningKind, Warnings};

/// Post-run status of one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionStatus {
    pub category: Category,
    pub exclude: bool,
    pub argument: String,
    pub matched: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    criteria: BTreeMap<Category, Vec<Criterion>>,
    and_mode: bool,
    frozen: bool,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion.
    ///
    /// Fails with [`Error::Frozen`] after [`freeze`](Self::freeze), and with
    /// [`Error::MixedExclusion`] when an fd criterion disagrees with the
    /// exclude flag of those already stored. A rejected add leaves the store
    /// unchanged.
    ///
    /// A link-count selection replaces any earlier one; a threshold of 0
    /// removes it.
    pub fn add(&mut self, selector: Selector, exclude: bool) -> Result<()> {
        let category = selector.category();
        let reject = |err: Error| -> Result<()> {
            debug!(
                target: event_names::SELECT_REJECTED,
                category = %category,
                exclude,
                reason = %err,
                "selection rejected"
            );
            Err(err)
        };

        if self.frozen {
            return reject(Error::Frozen);
        }
        match category {
            Category::Task if exclude => {
                return reject(Error::InvalidArgument(
                    "task selection can't be excluded".to_string(),
                ));
            }
            Category::Fd => {
                let mixed = self
                    .criteria
                    .get(&Category::Fd)
                    .and_then(|v| v.first())
                    .is_some_and(|first| first.exclude != exclude);
                if mixed {
                    return reject(Error::MixedExclusion {
                        category: category.to_string(),
                    });
                }
            }
            _ => {}
        }

        if let Selector::LinkCount(limit) = selector {
            self.criteria.remove(&Category::LinkCount);
            if limit == 0 {
                debug!(
                    target: event_names::SELECT_ADDED,
                    category = %category,
                    "link count selection cleared"
                );
                return Ok(());
            }
        }
        if category == Category::Task && self.contains(Category::Task) {
            return Ok(());
        }

        debug!(
            target: event_names::SELECT_ADDED,
            category = %category,
            exclude,
            argument = %selector.argument(),
            "selection added"
        );
        self.criteria
            .entry(category)
            .or_default()
            .push(Criterion::new(selector, exclude));
        Ok(())
    }

    /// Choose AND (`true`) or OR (`false`) composition across categories.
    pub fn set_mode(&mut self, and_mode: bool) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        self.and_mode = and_mode;
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn and_mode(&self) -> bool {
        self.and_mode
    }

    /// Total number of stored criteria.
    pub fn len(&self) -> usize {
        self.criteria.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, category: Category) -> bool {
        self.criteria.get(&category).is_some_and(|v| !v.is_empty())
    }

    pub fn criteria(&self, category: Category) -> &[Criterion] {
        self.criteria.get(&category).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.values().flatten()
    }

    /// Any criterion, inclusive or exclusive, that tests files.
    pub fn has_file_level_criteria(&self) -> bool {
        self.iter().any(|c| c.category().is_file_level())
    }

    pub fn needs_mounts(&self) -> bool {
        self.iter().any(|c| c.category().needs_mounts())
    }

    pub fn reset_matches(&mut self) {
        for criterion in self.criteria.values_mut().flatten() {
            criterion.matched = false;
        }
    }

    /// One status per criterion, grouped by category in insertion order.
    pub fn statuses(&self) -> Vec<SelectionStatus> {
        self.iter()
            .map(|c| SelectionStatus {
                category: c.category(),
                exclude: c.exclude,
                argument: c.selector.argument(),
                matched: c.matched,
            })
            .collect()
    }

    pub(crate) fn categories_mut(
        &mut self,
    ) -> impl Iterator<Item = (Category, &mut Vec<Criterion>)> {
        self.criteria.iter_mut().map(|(c, v)| (*c, v))
    }

    /// Resolve path and file-system selections against the probe and the
    /// mount table. Already bound selections are left alone.
    pub fn bind_paths(
        &mut self,
        probe: &dyn FsProbe,
        mounts: &MountTable,
        avoid_blocking: bool,
        warnings: &mut Warnings,
    ) {
        for criterion in self.criteria.values_mut().flatten() {
            let Some(sel) = criterion.selector.path_selection_mut() else {
                continue;
            };
            if sel.bound.is_none() {
                sel.bound = Some(bind_path(sel, probe, mounts, avoid_blocking, warnings));
            }
        }
    }

    /// Forget path bindings, e.g. after the mount table was invalidated.
    pub fn unbind_paths(&mut self) {
        for criterion in self.criteria.values_mut().flatten() {
            if let Some(sel) = criterion.selector.path_selection_mut() {
                sel.bound = None;
            }
        }
    }
}

fn bind_path(
    sel: &PathSelection,
    probe: &dyn FsProbe,
    mounts: &MountTable,
    avoid_blocking: bool,
    warnings: &mut Warnings,
) -> BoundPath {
    let requested = &sel.requested;
    let resolved = if avoid_blocking {
        None
    } else {
        match probe.resolve(requested) {
            Ok(path) => Some(path),
            Err(err) => {
                if !sel.flags.accept_deleted {
                    warnings.record(
                        WarningKind::SelectionUnresolved,
                        format!("can't resolve {}: {}", requested.display(), err),
                        Some(requested.as_path()),
                    );
                }
                None
            }
        }
    };

    let stat = resolved.as_ref().and_then(|p| probe.stat(p).ok());
    let resolved = resolved.unwrap_or_else(|| requested.clone());

    let mount = if sel.flags.only_files {
        None
    } else {
        mounts
            .find_dir(&resolved)
            .or_else(|| {
                // a block device names the file system mounted from it
                stat.filter(FileStat::is_device).and_then(|_| {
                    mounts
                        .iter()
                        .find(|e| e.source_resolved.as_deref() == Some(resolved.as_path()))
                })
            })
            .map(|e| MountBinding {
                directory: e.directory.clone(),
                device: e.device_id,
            })
    };

    if sel.flags.only_file_systems && mount.is_none() {
        warnings.record(
            WarningKind::SelectionUnresolved,
            format!("{} is not a mounted file system", requested.display()),
            Some(requested.as_path()),
        );
    }

    BoundPath {
        resolved,
        identity: stat.map(|s| (s.dev, s.ino)),
        mount,
    }
}
