//! Turns raw mount-table lines into a [`MountTable`].
//!
//! Per line:
//! 1. Split into whitespace-separated fields; fewer than three is ignored.
//! 2. Decode octal escapes in the source and directory fields.
//! 3. Drop automounter placeholders (`host:(pid123)`) and the autofs,
//!    pipefs and sockfs pseudo file systems.
//! 4. Resolve the directory through symlinks unless readlink-exempt.
//! 5. De-duplicate: the first entry for a directory wins, except that an
//!    NFS entry replaces a non-NFS entry for `/`.
//! 6. stat the directory unless stat-exempt, falling back to the
//!    supplement when stat fails.
//! 7. Resolve and stat the source spec for `fs_mode`.
//!
//! Nothing here fails the whole pass. Problems with one line drop or
//! partially populate that entry and are recorded as warnings.

use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use lsx_common::DeviceId;
use lsx_config::{Exemption, ExemptionList};
use tracing::{debug, trace};

use crate::logging::event_names;
use crate::mount::escape::decode_path;
use crate::mount::supplement::Supplement;
use crate::mount::table::{FsKind, MountEntry, MountTable};
use crate::probe::{FileStat, FsProbe, ProbeError};
use crate::warnings::{WarningKind, Warnings};

/// File system types never entered into the table.
pub const IGNORED_FS_TYPES: &[&str] = &["autofs", "pipefs", "sockfs"];

const AUTOMOUNT_MARKER: &[u8] = b"(pid";

pub struct MountResolver<'a> {
    probe: &'a dyn FsProbe,
    exemptions: &'a ExemptionList,
    avoid_blocking: bool,
    supplement: &'a mut Supplement,
    warnings: &'a mut Warnings,
}

impl<'a> MountResolver<'a> {
    pub fn new(
        probe: &'a dyn FsProbe,
        exemptions: &'a ExemptionList,
        supplement: &'a mut Supplement,
        warnings: &'a mut Warnings,
    ) -> Self {
        Self {
            probe,
            exemptions,
            avoid_blocking: false,
            supplement,
            warnings,
        }
    }

    /// Treat every mount as fully exempt: no stat, no readlink.
    pub fn avoid_blocking(mut self, avoid: bool) -> Self {
        self.avoid_blocking = avoid;
        self
    }

    pub fn resolve_lines<I, L>(mut self, lines: I) -> MountTable
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut table = MountTable::default();
        for (idx, line) in lines.into_iter().enumerate() {
            self.resolve_line(&mut table, line.as_ref(), idx + 1);
        }
        table
    }

    fn resolve_line(&mut self, table: &mut MountTable, line: &[u8], line_no: usize) {
        let fields: Vec<&[u8]> = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.len() < 3 {
            return;
        }

        let (source, dir) = match (decode_path(fields[0]), decode_path(fields[1])) {
            (Ok(Some(source)), Ok(Some(dir))) => (source, dir),
            (Err(err), _) | (_, Err(err)) => {
                self.warnings.record(
                    WarningKind::MountIncomplete,
                    format!("mount line {}: {}", line_no, err),
                    None,
                );
                return;
            }
            _ => return,
        };
        let fs_type = String::from_utf8_lossy(fields[2]).into_owned();

        if is_automount_placeholder(&source) {
            trace!(
                target: event_names::MOUNTS_LINE_SKIPPED,
                line = line_no as u64,
                "automounter entry"
            );
            return;
        }
        if IGNORED_FS_TYPES
            .iter()
            .any(|t| fs_type.eq_ignore_ascii_case(t))
        {
            trace!(
                target: event_names::MOUNTS_LINE_SKIPPED,
                line = line_no as u64,
                fs_type = %fs_type,
                "pseudo file system"
            );
            return;
        }

        let exemption = if self.avoid_blocking {
            Exemption::FULL
        } else {
            self.exemptions.get(&dir)
        };

        let dir = if exemption.skip_readlink {
            dir
        } else {
            match self.probe.resolve(&dir) {
                Ok(resolved) => resolved,
                Err(err) => {
                    self.probe_warning(
                        WarningKind::ReadlinkFailed,
                        &dir,
                        &err,
                        format!("can't readlink {}", dir.display()),
                    );
                    return;
                }
            }
        };
        if dir.as_os_str().as_bytes().first() != Some(&b'/') {
            return;
        }

        let kind = FsKind::classify(&fs_type);
        if kind == FsKind::Nfs {
            table.note_nfs_listed();
        }

        let replace = match table.position(&dir) {
            None => None,
            Some(idx) => {
                if dir != Path::new("/")
                    || table.kind_at(idx) == FsKind::Nfs
                    || kind != FsKind::Nfs
                {
                    trace!(
                        target: event_names::MOUNTS_LINE_SKIPPED,
                        line = line_no as u64,
                        dir = %dir.display(),
                        "duplicate directory"
                    );
                    return;
                }
                debug!(
                    target: event_names::MOUNTS_ROOT_REPLACED,
                    fs_type = %fs_type,
                    "NFS root supersedes earlier root entry"
                );
                Some(idx)
            }
        };

        let mut stat: Option<FileStat> = None;
        let mut assumed_dev: Option<DeviceId> = None;
        if !exemption.skip_stat {
            match self.probe.stat(&dir) {
                Ok(s) => stat = Some(s),
                Err(err) if self.supplement.is_configured() => {
                    match self.supplement.lookup(&dir, self.warnings) {
                        Some(dev) => {
                            let from = self
                                .supplement
                                .path()
                                .map(|p| p.display().to_string())
                                .unwrap_or_else(|| "mount supplement".to_string());
                            self.warnings.record(
                                WarningKind::SupplementAssumed,
                                format!("assuming dev={} for {} from {}", dev, dir.display(), from),
                                Some(&dir),
                            );
                            assumed_dev = Some(dev);
                        }
                        None => self.probe_warning(
                            WarningKind::StatFailed,
                            &dir,
                            &err,
                            format!("can't stat() {} file system {}", fs_type, dir.display()),
                        ),
                    }
                }
                Err(err) => {
                    self.probe_warning(
                        WarningKind::StatFailed,
                        &dir,
                        &err,
                        format!("can't stat() {} file system {}", fs_type, dir.display()),
                    );
                    return;
                }
            }
        }

        let (source_resolved, fs_mode) = self.resolve_source(&source, exemption);

        let entry = MountEntry {
            directory: dir,
            source_spec: source,
            source_resolved,
            fs_type,
            kind,
            device_id: stat.map(|s| s.dev).or(assumed_dev),
            raw_device_id: stat.filter(FileStat::is_device).map(|s| s.rdev),
            inode: stat.map(|s| s.ino),
            mode: stat.map(|s| s.mode),
            fs_mode,
        };
        table.store(entry, replace);
    }

    /// Resolve the source spec. Remote specs and readlink-exempt mounts are
    /// kept verbatim and never stat'ed.
    fn resolve_source(
        &mut self,
        source: &Path,
        exemption: Exemption,
    ) -> (Option<PathBuf>, Option<u32>) {
        let is_path = source.as_os_str().as_bytes().first() == Some(&b'/');
        if exemption.skip_readlink || !is_path {
            return (Some(source.to_path_buf()), None);
        }

        match self.probe.resolve(source) {
            Ok(resolved) => {
                let mode = if exemption.skip_stat {
                    None
                } else {
                    self.probe.stat(&resolved).ok().map(|s| s.mode)
                };
                (Some(resolved), mode)
            }
            Err(err) => {
                if matches!(err, ProbeError::TimedOut { .. }) {
                    self.probe_warning(
                        WarningKind::ProbeTimeout,
                        source,
                        &err,
                        format!("can't resolve {}", source.display()),
                    );
                }
                (None, None)
            }
        }
    }

    fn probe_warning(&mut self, kind: WarningKind, path: &Path, err: &ProbeError, what: String) {
        let kind = match err {
            ProbeError::TimedOut { .. } => WarningKind::ProbeTimeout,
            _ => kind,
        };
        self.warnings.record(
            kind,
            format!("{}: {}; output information may be incomplete", what, err),
            Some(path),
        );
    }
}

/// `host:(pid123)` style automounter devices.
fn is_automount_placeholder(source: &Path) -> bool {
    let bytes = source.as_os_str().as_bytes();
    match bytes.iter().position(|b| *b == b':') {
        Some(colon) => bytes[colon + 1..]
            .get(..AUTOMOUNT_MARKER.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(AUTOMOUNT_MARKER)),
        None => false,
    }
}
