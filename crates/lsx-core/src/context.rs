//! The lsx context: one configured selection run.
//!
//! A context owns everything a run touches: options, the selection store,
//! the cached mount table, the supplement, the warnings sink and the
//! filesystem probe. Two contexts share nothing.
//!
//! Lifecycle: create, add selections, [`freeze`](Context::freeze), then
//! [`gather`](Context::gather) as often as needed. The mount table is
//! resolved at most once until [`invalidate_mounts`](Context::invalidate_mounts).

use std::time::Duration;

use lsx_common::Result;
use lsx_config::{ExemptionList, GatherOptions};
use tracing::{debug, info, info_span, trace};

use crate::logging::{event_names, Stage};
use crate::mount::{MountResolver, MountSource, MountTable, ProcMountSource, Supplement};
use crate::probe::{DirectProbe, FsProbe, IsolatedProbe};
use crate::select::{Selector, SelectionStore};
use crate::warnings::{Warning, Warnings};

pub struct Context {
    pub(crate) options: GatherOptions,
    exemptions: ExemptionList,
    pub(crate) store: SelectionStore,
    pub(crate) mounts: Option<MountTable>,
    supplement: Supplement,
    pub(crate) warnings: Warnings,
    pub(crate) probe: Box<dyn FsProbe>,
    source: Box<dyn MountSource>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.options)
            .field("store", &self.store)
            .field("mounts_cached", &self.mounts.is_some())
            .field("source", &self.source.describe())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Validate `options` and build a context using the real file system.
    pub fn new(options: GatherOptions) -> Result<Self> {
        options.validate()?;

        let probe: Box<dyn FsProbe> = if options.blocking.isolate {
            Box::new(IsolatedProbe::new(
                DirectProbe,
                Duration::from_millis(options.blocking.timeout_ms),
            ))
        } else {
            Box::new(DirectProbe)
        };
        let source = Box::new(ProcMountSource::new(options.mounts_path.clone()));

        debug!(
            target: event_names::CONTEXT_CREATED,
            mounts = %options.mounts_path.display(),
            isolate = options.blocking.isolate,
            avoid_blocking = options.blocking.avoid,
            "context created"
        );

        Ok(Self {
            exemptions: options.exemptions(),
            supplement: Supplement::new(options.mount_supplement.clone()),
            warnings: Warnings::new(options.warnings),
            store: SelectionStore::new(),
            mounts: None,
            probe,
            source,
            options,
        })
    }

    /// Replace the filesystem probe.
    pub fn with_probe(mut self, probe: Box<dyn FsProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replace where mount lines come from.
    pub fn with_mount_source(mut self, source: Box<dyn MountSource>) -> Self {
        self.source = source;
        self
    }

    pub fn options(&self) -> &GatherOptions {
        &self.options
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub fn warnings(&self) -> &[Warning] {
        self.warnings.entries()
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.warnings.take()
    }

    pub fn add_selection(&mut self, selector: Selector, exclude: bool) -> Result<()> {
        self.store.add(selector, exclude)
    }

    pub fn set_and_mode(&mut self, and_mode: bool) -> Result<()> {
        self.store.set_mode(and_mode)
    }

    /// Stop accepting selections.
    pub fn freeze(&mut self) {
        if !self.store.is_frozen() {
            self.store.freeze();
            info!(
                target: event_names::CONTEXT_FROZEN,
                criteria = self.store.len() as u64,
                and_mode = self.store.and_mode(),
                "selection frozen"
            );
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.store.is_frozen()
    }

    /// The cached mount table, if resolved.
    pub fn mounts(&self) -> Option<&MountTable> {
        self.mounts.as_ref()
    }

    /// Resolve the mount table, reading the source only the first time.
    ///
    /// Fails only when the source itself can't be read; per-line problems
    /// become warnings.
    pub fn resolve_mounts(&mut self) -> Result<&MountTable> {
        let table = match self.mounts.take() {
            Some(table) => {
                trace!(
                    target: event_names::MOUNTS_CACHED,
                    entries = table.len() as u64,
                    "mount table cached"
                );
                table
            }
            None => self.load_mounts()?,
        };
        Ok(&*self.mounts.insert(table))
    }

    /// Drop the cached mount table. Path selections are re-bound against
    /// the next table.
    pub fn invalidate_mounts(&mut self) {
        if self.mounts.take().is_some() {
            self.store.unbind_paths();
            debug!(target: event_names::MOUNTS_INVALIDATED, "mount table invalidated");
        }
    }

    fn load_mounts(&mut self) -> Result<MountTable> {
        let _span = info_span!("mounts", stage = %Stage::Mounts).entered();
        debug!(
            target: event_names::MOUNTS_STARTED,
            source = %self.source.describe(),
            "resolving mount table"
        );

        let lines = self.source.read_lines()?;
        let table = MountResolver::new(
            self.probe.as_ref(),
            &self.exemptions,
            &mut self.supplement,
            &mut self.warnings,
        )
        .avoid_blocking(self.options.blocking.avoid)
        .resolve_lines(lines);

        info!(
            target: event_names::MOUNTS_FINISHED,
            entries = table.len() as u64,
            nfs = ?table.nfs_presence(),
            "mount table resolved"
        );
        Ok(table)
    }
}
