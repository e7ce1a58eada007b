//! The gather pipeline: discovery, mount annotation, evaluation and
//! assembly of the result.

use chrono::Utc;
use serde::Serialize;
use std::time::Instant;

use lsx_common::{Error, Result};
use tracing::{debug, error, info, info_span, trace};

use crate::context::Context;
use crate::logging::{event_names, generate_run_id, Stage};
use crate::mount::MountTable;
use crate::record::{OpenFileRecord, ProcessInfo, ProcessRecord};
use crate::select::{Category, SelectionStatus, Subject};
use crate::warnings::Warning;

/// Exit code used when `exit_on_fatal` is set and a fatal error surfaces.
pub const EXIT_FATAL: i32 = 1;

/// Platform discovery of processes and their open files.
pub trait Discovery {
    fn processes(&mut self) -> Result<Vec<ProcessRecord>>;

    fn describe(&self) -> String {
        "discovery".to_string()
    }
}

/// Discovery replaying a fixed set of records.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    records: Vec<ProcessRecord>,
}

impl StaticDiscovery {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Self { records }
    }

    /// Parse a JSON array of process records.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

impl Discovery for StaticDiscovery {
    fn processes(&mut self) -> Result<Vec<ProcessRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("{} static records", self.records.len())
    }
}

/// A selected process with the files that survived selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    #[serde(flatten)]
    pub info: ProcessInfo,
    pub files: Vec<OpenFileRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatherMetadata {
    pub run_id: String,
    /// RFC 3339.
    pub started_at: String,
    pub duration_ms: u64,
    pub process_count: usize,
    pub file_count: usize,
    /// Entries in the mount table, if one was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatherResult {
    pub processes: Vec<ProcessReport>,
    pub selections: Vec<SelectionStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    pub metadata: GatherMetadata,
}

impl GatherResult {
    /// Criteria that never matched anything.
    pub fn unmatched(&self) -> impl Iterator<Item = &SelectionStatus> {
        self.selections.iter().filter(|s| !s.matched)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Context {
    /// Run discovery and selection.
    ///
    /// Requires a frozen context. When `exit_on_fatal` is set an allocation
    /// failure terminates the process with [`EXIT_FATAL`] instead of being
    /// returned.
    pub fn gather(&mut self, discovery: &mut dyn Discovery) -> Result<GatherResult> {
        match self.run_gather(discovery) {
            Err(err) if err.is_fatal() && self.options.exit_on_fatal => {
                error!(target: event_names::FATAL, code = err.code(), error = %err, "fatal error");
                std::process::exit(EXIT_FATAL);
            }
            other => other,
        }
    }

    fn run_gather(&mut self, discovery: &mut dyn Discovery) -> Result<GatherResult> {
        if !self.store.is_frozen() {
            return Err(Error::NotFrozen);
        }

        let run_id = generate_run_id();
        let started_at = Utc::now().to_rfc3339();
        let start = Instant::now();
        let span = info_span!("gather", run_id = %run_id, stage = %Stage::Gather);
        let _enter = span.enter();

        info!(
            target: event_names::GATHER_STARTED,
            criteria = self.store.len() as u64,
            and_mode = self.store.and_mode(),
            discovery = %discovery.describe(),
            "gather started"
        );

        self.store.reset_matches();
        if self.store.needs_mounts() {
            self.resolve_mounts()?;
            if let Some(mounts) = self.mounts.as_ref() {
                self.store.bind_paths(
                    self.probe.as_ref(),
                    mounts,
                    self.options.blocking.avoid,
                    &mut self.warnings,
                );
            }
        }

        let records = discovery.processes()?;
        let include_tasks = self.store.contains(Category::Task);
        let file_level = self.store.has_file_level_criteria();
        let mounts = self.mounts.as_ref();

        let mut processes = Vec::new();
        let mut file_count = 0usize;
        for record in records {
            let ProcessRecord {
                info,
                files: candidates,
                report_without_files,
            } = record;

            if info.tid.is_some() && !include_tasks {
                trace!(pid = info.pid.0, tid = ?info.tid, "task record dropped");
                continue;
            }

            let mut files = Vec::new();
            for mut file in candidates {
                if let Some(table) = mounts {
                    annotate(&mut file, table);
                }
                let subject = Subject::file(&info, &file).with_mounts(mounts);
                if self.store.evaluate(&subject) {
                    files.push(file);
                }
            }

            if files.is_empty() {
                let keep = report_without_files
                    && !file_level
                    && self
                        .store
                        .evaluate(&Subject::process(&info).with_mounts(mounts));
                if !keep {
                    continue;
                }
            }

            file_count += files.len();
            processes.push(ProcessReport { info, files });
        }

        let selections = self.store.statuses();
        for status in selections.iter().filter(|s| !s.matched) {
            debug!(
                category = %status.category,
                argument = %status.argument,
                exclude = status.exclude,
                "selection never matched"
            );
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            target: event_names::GATHER_FINISHED,
            processes = processes.len() as u64,
            files = file_count as u64,
            duration_ms,
            "gather finished"
        );

        Ok(GatherResult {
            metadata: GatherMetadata {
                run_id,
                started_at,
                duration_ms,
                process_count: processes.len(),
                file_count,
                mount_count: mounts.map(MountTable::len),
            },
            processes,
            selections,
            warnings: self.warnings.take(),
        })
    }
}

/// Fill a file's device from the mount it lives on when discovery left it
/// unknown. The inode is taken only for the mounted-on directory itself.
fn annotate(file: &mut OpenFileRecord, table: &MountTable) {
    if file.device.is_some() {
        return;
    }
    let Some(path) = file.path() else {
        return;
    };
    let Some(entry) = table.containing(path) else {
        return;
    };
    let inode = if path == entry.directory { entry.inode } else { None };
    let device = entry.device_id;

    file.device = device;
    if file.inode.is_none() {
        file.inode = inode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountEntry;
    use crate::record::FdKind;
    use lsx_common::DeviceId;

    fn table() -> MountTable {
        let mut root = MountEntry::new("/", "/dev/sda1", "ext4");
        root.device_id = Some(DeviceId(0x801));
        root.inode = Some(2);
        let mut data = MountEntry::new("/data", "/dev/sdb1", "xfs");
        data.device_id = Some(DeviceId(0x811));
        data.inode = Some(128);
        vec![root, data].into_iter().collect()
    }

    #[test]
    fn test_annotate_fills_missing_device() {
        let mut file = OpenFileRecord::new(FdKind::Numeric(3), "/data/x.log");
        annotate(&mut file, &table());
        assert_eq!(file.device, Some(DeviceId(0x811)));
        assert_eq!(file.inode, None);
    }

    #[test]
    fn test_annotate_mount_dir_gets_inode() {
        let mut file = OpenFileRecord::new(FdKind::Cwd, "/data");
        annotate(&mut file, &table());
        assert_eq!(file.inode, Some(128));
    }

    #[test]
    fn test_annotate_keeps_known_device() {
        let mut file = OpenFileRecord::new(FdKind::Numeric(3), "/data/x").with_device(0x999, 7);
        annotate(&mut file, &table());
        assert_eq!(file.device, Some(DeviceId(0x999)));
        assert_eq!(file.inode, Some(7));

        let mut sock = OpenFileRecord::new(FdKind::Numeric(4), "socket:[77]");
        annotate(&mut sock, &table());
        assert_eq!(sock.device, None);
    }

    #[test]
    fn test_static_discovery_from_json() {
        let json = r#"[{"pid": 7, "command": "cron", "files": [{"fd": {"kind": "cwd"}, "name": "/"}]}]"#;
        let mut discovery = StaticDiscovery::from_json(json).unwrap();
        let records = discovery.processes().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].files[0].fd, FdKind::Cwd);
        assert!(StaticDiscovery::from_json("{").is_err());
    }
}
