//! Filesystem probes: the stat and symlink-resolution calls the mount
//! resolver and selection binding depend on.
//!
//! Both calls can hang on an unresponsive file system (a stuck NFS mount).
//! [`IsolatedProbe`] bounds them by running each call on a short-lived
//! worker thread; a call that does not answer in time is reported as
//! [`ProbeError::TimedOut`] and the worker is abandoned. Callers treat a
//! timeout exactly like any other failure: the answer is unknown.
//!
//! An abandoned worker stays blocked in the kernel until the file system
//! answers, and cannot be cancelled. The number of workers alive at once
//! is capped; past the cap calls fail fast with
//! [`ProbeError::Unavailable`] instead of spawning more.

use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lsx_common::DeviceId;
use thiserror::Error;
use tracing::{trace, warn};

use crate::logging::event_names;

/// Fields of a successful stat(2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub dev: DeviceId,
    pub rdev: DeviceId,
    pub ino: u64,
    pub mode: u32,
}

impl FileStat {
    /// True for character and block special files.
    pub fn is_device(&self) -> bool {
        let fmt = self.mode & libc::S_IFMT;
        fmt == libc::S_IFCHR || fmt == libc::S_IFBLK
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }
}

impl From<&std::fs::Metadata> for FileStat {
    fn from(meta: &std::fs::Metadata) -> Self {
        FileStat {
            dev: DeviceId(meta.dev()),
            rdev: DeviceId(meta.rdev()),
            ino: meta.ino(),
            mode: meta.mode(),
        }
    }
}

/// Probe failures. Every variant means "unknown" to callers.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}: no such file or directory")]
    NotFound(PathBuf),

    #[error("{path}: no answer within {timeout:?}")]
    TimedOut { path: PathBuf, timeout: Duration },

    #[error("probe worker unavailable: {0}")]
    Unavailable(String),
}

impl From<ProbeError> for lsx_common::Error {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Io { source, .. } => lsx_common::Error::Io(source),
            ProbeError::TimedOut { path, timeout } => lsx_common::Error::Timeout {
                path: path.display().to_string(),
                millis: timeout.as_millis() as u64,
            },
            other => lsx_common::Error::Discovery(other.to_string()),
        }
    }
}

/// Blocking filesystem calls.
pub trait FsProbe: Send + Sync {
    /// stat(2), following symlinks.
    fn stat(&self, path: &Path) -> Result<FileStat, ProbeError>;

    /// Resolve every symlink component (realpath semantics).
    fn resolve(&self, path: &Path) -> Result<PathBuf, ProbeError>;
}

impl<P: FsProbe + ?Sized> FsProbe for Arc<P> {
    fn stat(&self, path: &Path) -> Result<FileStat, ProbeError> {
        (**self).stat(path)
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, ProbeError> {
        (**self).resolve(path)
    }
}

impl<P: FsProbe + ?Sized> FsProbe for Box<P> {
    fn stat(&self, path: &Path) -> Result<FileStat, ProbeError> {
        (**self).stat(path)
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, ProbeError> {
        (**self).resolve(path)
    }
}

/// Calls the OS directly on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectProbe;

impl FsProbe for DirectProbe {
    fn stat(&self, path: &Path) -> Result<FileStat, ProbeError> {
        std::fs::metadata(path)
            .map(|meta| FileStat::from(&meta))
            .map_err(|source| ProbeError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, ProbeError> {
        std::fs::canonicalize(path).map_err(|source| ProbeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Default cap on live probe workers, abandoned ones included.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Runs each call of an inner probe on a worker thread with a deadline.
///
/// Workers that miss the deadline keep running until the inner call
/// returns. At most `max_workers` may be alive at once.
pub struct IsolatedProbe<P> {
    inner: Arc<P>,
    timeout: Duration,
    timeouts: Arc<AtomicU64>,
    live: Arc<AtomicUsize>,
    max_workers: usize,
}

/// Releases a worker slot when the worker exits, panics included.
struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<P: FsProbe + 'static> IsolatedProbe<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            timeouts: Arc::new(AtomicU64::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Workers currently alive, including abandoned ones still blocked.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of calls abandoned so far.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn run<T: Send + 'static>(
        &self,
        path: &Path,
        op: fn(&P, &Path) -> Result<T, ProbeError>,
    ) -> Result<T, ProbeError> {
        let reserved = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_workers).then_some(n + 1)
            });
        if reserved.is_err() {
            warn!(
                path = %path.display(),
                max_workers = self.max_workers,
                "all probe workers are blocked"
            );
            return Err(ProbeError::Unavailable(format!(
                "{} workers still blocked",
                self.max_workers
            )));
        }
        let slot = WorkerSlot(Arc::clone(&self.live));

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = path.to_path_buf();

        // On spawn failure the closure, and the slot with it, is dropped.
        thread::Builder::new()
            .name("lsx-probe".to_string())
            .spawn(move || {
                let _slot = slot;
                // The receiver is gone if we already timed out.
                let _ = tx.send(op(&inner, &owned));
            })
            .map_err(|e| ProbeError::Unavailable(e.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: event_names::PROBE_TIMED_OUT,
                    path = %path.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "blocking call abandoned"
                );
                Err(ProbeError::TimedOut {
                    path: path.to_path_buf(),
                    timeout: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(ProbeError::Unavailable("probe worker exited".to_string()))
            }
        }
    }
}

impl<P: FsProbe + 'static> FsProbe for IsolatedProbe<P> {
    fn stat(&self, path: &Path) -> Result<FileStat, ProbeError> {
        self.run(path, |probe, p| probe.stat(p))
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, ProbeError> {
        self.run(path, |probe, p| probe.resolve(p))
    }
}

/// In-memory probe for replaying a captured system.
///
/// A path resolves if it has a stat entry, a link, or was added with
/// [`MapProbe::with_path`]; it stats only if it has a stat entry.
#[derive(Debug, Default)]
pub struct MapProbe {
    stats: HashMap<PathBuf, FileStat>,
    links: HashMap<PathBuf, PathBuf>,
    stat_calls: AtomicU64,
    resolve_calls: AtomicU64,
}

impl MapProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stat(mut self, path: impl Into<PathBuf>, stat: FileStat) -> Self {
        self.stats.insert(path.into(), stat);
        self
    }

    /// A directory with the given device and inode.
    pub fn with_dir(self, path: impl Into<PathBuf>, dev: u64, ino: u64) -> Self {
        self.with_stat(
            path,
            FileStat {
                dev: DeviceId(dev),
                rdev: DeviceId(0),
                ino,
                mode: libc::S_IFDIR | 0o755,
            },
        )
    }

    /// A block device node.
    pub fn with_block_device(self, path: impl Into<PathBuf>, rdev: u64) -> Self {
        self.with_stat(
            path,
            FileStat {
                dev: DeviceId(5),
                rdev: DeviceId(rdev),
                ino: 100 + rdev,
                mode: libc::S_IFBLK | 0o660,
            },
        )
    }

    pub fn with_link(mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        self.links.insert(from.into(), to.into());
        self
    }

    /// A path that resolves to itself but cannot be stat'ed.
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.with_link(path.clone(), path)
    }

    pub fn stat_calls(&self) -> u64 {
        self.stat_calls.load(Ordering::Relaxed)
    }

    pub fn resolve_calls(&self) -> u64 {
        self.resolve_calls.load(Ordering::Relaxed)
    }
}

impl FsProbe for MapProbe {
    fn stat(&self, path: &Path) -> Result<FileStat, ProbeError> {
        self.stat_calls.fetch_add(1, Ordering::Relaxed);
        let target = self.links.get(path).map(PathBuf::as_path).unwrap_or(path);
        trace!(path = %path.display(), "map probe stat");
        self.stats
            .get(target)
            .copied()
            .ok_or_else(|| ProbeError::NotFound(path.to_path_buf()))
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, ProbeError> {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(target) = self.links.get(path) {
            return Ok(target.clone());
        }
        if self.stats.contains_key(path) {
            return Ok(path.to_path_buf());
        }
        Err(ProbeError::NotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProbe(Duration);

    impl FsProbe for SlowProbe {
        fn stat(&self, path: &Path) -> Result<FileStat, ProbeError> {
            thread::sleep(self.0);
            DirectProbe.stat(path)
        }

        fn resolve(&self, path: &Path) -> Result<PathBuf, ProbeError> {
            thread::sleep(self.0);
            Ok(path.to_path_buf())
        }
    }

    #[test]
    fn test_direct_probe_stats_root() {
        let stat = DirectProbe.stat(Path::new("/")).unwrap();
        assert!(stat.is_dir());
        assert!(!stat.is_device());
        assert_eq!(DirectProbe.resolve(Path::new("/")).unwrap(), PathBuf::from("/"));
    }

    #[test]
    fn test_direct_probe_missing_path() {
        let err = DirectProbe
            .stat(Path::new("/definitely/not/here/lsx"))
            .unwrap_err();
        assert!(matches!(err, ProbeError::Io { .. }));
    }

    #[test]
    fn test_isolated_probe_passes_answers_through() {
        let probe = IsolatedProbe::new(
            MapProbe::new().with_dir("/data", 0x803, 2),
            Duration::from_secs(5),
        );
        let stat = probe.stat(Path::new("/data")).unwrap();
        assert_eq!(stat.dev, DeviceId(0x803));
        assert_eq!(probe.timeouts(), 0);
    }

    #[test]
    fn test_isolated_probe_times_out() {
        let probe = IsolatedProbe::new(
            SlowProbe(Duration::from_millis(500)),
            Duration::from_millis(20),
        );

        let err = probe.resolve(Path::new("/net/stuck")).unwrap_err();
        assert!(matches!(err, ProbeError::TimedOut { .. }));
        assert_eq!(probe.timeouts(), 1);

        let err = probe.stat(Path::new("/net/stuck")).unwrap_err();
        assert!(matches!(err, ProbeError::TimedOut { .. }));
        assert_eq!(probe.timeouts(), 2);
    }

    #[test]
    fn test_blocked_workers_are_capped() {
        let probe = IsolatedProbe::new(
            SlowProbe(Duration::from_millis(300)),
            Duration::from_millis(20),
        )
        .with_max_workers(1);

        let err = probe.resolve(Path::new("/net/stuck")).unwrap_err();
        assert!(matches!(err, ProbeError::TimedOut { .. }));
        assert_eq!(probe.live_workers(), 1);

        // the abandoned worker still holds the only slot
        let err = probe.resolve(Path::new("/net/stuck")).unwrap_err();
        assert!(matches!(err, ProbeError::Unavailable(_)));
        assert_eq!(probe.timeouts(), 1);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while probe.live_workers() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(probe.live_workers(), 0);
        let err = probe.resolve(Path::new("/net/stuck")).unwrap_err();
        assert!(matches!(err, ProbeError::TimedOut { .. }));
    }

    #[test]
    fn test_map_probe_links_and_paths() {
        let probe = MapProbe::new()
            .with_dir("/real", 1, 2)
            .with_link("/alias", "/real")
            .with_path("/unstatable");

        assert_eq!(probe.resolve(Path::new("/alias")).unwrap(), PathBuf::from("/real"));
        assert_eq!(probe.stat(Path::new("/alias")).unwrap().ino, 2);
        assert!(probe.resolve(Path::new("/unstatable")).is_ok());
        assert!(probe.stat(Path::new("/unstatable")).is_err());
        assert!(probe.resolve(Path::new("/missing")).is_err());
        assert_eq!(probe.stat_calls(), 2);
        assert_eq!(probe.resolve_calls(), 3);
    }

    #[test]
    fn test_block_device_classification() {
        let probe = MapProbe::new().with_block_device("/dev/sda1", 0x801);
        let stat = probe.stat(Path::new("/dev/sda1")).unwrap();
        assert!(stat.is_device());
        assert_eq!(stat.rdev, DeviceId(0x801));
    }

    #[test]
    fn test_timeout_converts_to_discovery_error() {
        let err: lsx_common::Error = ProbeError::TimedOut {
            path: PathBuf::from("/net/a"),
            timeout: Duration::from_millis(1500),
        }
        .into();
        assert_eq!(err.code(), 31);
        assert_eq!(err.category(), lsx_common::ErrorCategory::Discovery);
    }
}
