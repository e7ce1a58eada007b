//! The canonical mount table.

use serde::Serialize;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use lsx_common::DeviceId;

/// File system classes that downstream matching cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsKind {
    Regular,
    Nfs,
    MessageQueue,
}

impl FsKind {
    /// Classify a file system type name, ignoring case.
    pub fn classify(fs_type: &str) -> Self {
        if ["nfs", "nfs3", "nfs4"]
            .iter()
            .any(|t| fs_type.eq_ignore_ascii_case(t))
        {
            FsKind::Nfs
        } else if fs_type.eq_ignore_ascii_case("mqueue") {
            FsKind::MessageQueue
        } else {
            FsKind::Regular
        }
    }
}

/// Whether NFS appeared in the mount table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NfsPresence {
    #[default]
    Absent,
    /// An NFS line was read but no NFS entry made it into the table.
    Listed,
    /// At least one table entry is NFS.
    Mounted,
}

/// One mounted file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountEntry {
    /// Mounted-on directory, symlinks resolved.
    pub directory: PathBuf,
    /// Device or remote spec as listed.
    pub source_spec: PathBuf,
    /// `source_spec` with symlinks resolved; absent if resolution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_resolved: Option<PathBuf>,
    pub fs_type: String,
    pub kind: FsKind,
    /// Absent means unknown, never zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_device_id: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inode: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    /// Mode of the resolved source spec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_mode: Option<u32>,
}

impl MountEntry {
    pub fn new(
        directory: impl Into<PathBuf>,
        source_spec: impl Into<PathBuf>,
        fs_type: &str,
    ) -> Self {
        Self {
            directory: directory.into(),
            source_spec: source_spec.into(),
            source_resolved: None,
            fs_type: fs_type.to_string(),
            kind: FsKind::classify(fs_type),
            device_id: None,
            raw_device_id: None,
            inode: None,
            mode: None,
            fs_mode: None,
        }
    }

    /// Byte length of the directory path.
    pub fn directory_len(&self) -> usize {
        self.directory.as_os_str().len()
    }

    pub fn is_nfs(&self) -> bool {
        self.kind == FsKind::Nfs
    }
}

/// Ordered, de-duplicated mount entries for one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountTable {
    entries: Vec<MountEntry>,
    nfs: NfsPresence,
    #[serde(skip_serializing_if = "Option::is_none")]
    mqueue_device: Option<DeviceId>,
}

impl MountTable {
    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MountEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn nfs_presence(&self) -> NfsPresence {
        self.nfs
    }

    /// Device of the message queue file system, if mounted and known.
    pub fn mqueue_device(&self) -> Option<DeviceId> {
        self.mqueue_device
    }

    /// Entry mounted exactly on `dir`.
    pub fn find_dir(&self, dir: &Path) -> Option<&MountEntry> {
        self.entries.iter().find(|e| e.directory == dir)
    }

    /// First entry with the given device.
    pub fn by_device(&self, dev: DeviceId) -> Option<&MountEntry> {
        self.entries.iter().find(|e| e.device_id == Some(dev))
    }

    /// The entry whose directory is the longest component-wise prefix of
    /// `path`.
    pub fn containing(&self, path: &Path) -> Option<&MountEntry> {
        self.entries
            .iter()
            .filter(|e| path.starts_with(&e.directory))
            .max_by_key(|e| e.directory.components().count())
    }

    /// Render in mount supplement format, one `<dir> 0x<hex>` line per
    /// entry, `0x0` for unknown devices.
    pub fn supplement_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                let dev = e.device_id.unwrap_or(DeviceId(0));
                format!(
                    "{} {}",
                    String::from_utf8_lossy(e.directory.as_os_str().as_bytes()),
                    dev
                )
            })
            .collect()
    }

    pub(crate) fn position(&self, dir: &Path) -> Option<usize> {
        self.entries.iter().position(|e| e.directory == dir)
    }

    pub(crate) fn kind_at(&self, idx: usize) -> FsKind {
        self.entries[idx].kind
    }

    pub(crate) fn note_nfs_listed(&mut self) {
        if self.nfs == NfsPresence::Absent {
            self.nfs = NfsPresence::Listed;
        }
    }

    /// Store an entry, replacing the one at `replace` if given.
    pub(crate) fn store(&mut self, entry: MountEntry, replace: Option<usize>) {
        match entry.kind {
            FsKind::Nfs => self.nfs = NfsPresence::Mounted,
            FsKind::MessageQueue => self.mqueue_device = entry.device_id,
            FsKind::Regular => {}
        }
        match replace {
            Some(idx) => self.entries[idx] = entry,
            None => self.entries.push(entry),
        }
    }
}

impl FromIterator<MountEntry> for MountTable {
    /// Build a table from already-resolved entries, first entry per
    /// directory wins.
    fn from_iter<I: IntoIterator<Item = MountEntry>>(iter: I) -> Self {
        let mut table = MountTable::default();
        for entry in iter {
            if entry.is_nfs() {
                table.note_nfs_listed();
            }
            if table.position(&entry.directory).is_none() {
                table.store(entry, None);
            }
        }
        table
    }
}

impl<'a> IntoIterator for &'a MountTable {
    type Item = &'a MountEntry;
    type IntoIter = std::slice::Iter<'a, MountEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
