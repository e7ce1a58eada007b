//! Selection criteria and their per-category match predicates.
//!
//! A [`Criterion`] pairs a [`Selector`] (what to look for) with an exclude
//! flag and a `matched` flag. `matched` is bookkeeping for the end-of-run
//! status report; it never influences a match decision.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use lsx_common::{DeviceId, Error, Result};

use super::inet::{InetSpec, IpFamily};
use crate::mount::MountTable;
use crate::record::{AddressFamily, FdKind, OpenFileRecord, ProcessInfo};

/// The fixed kinds of criteria. Categories are composed with AND/OR;
/// criteria inside one category are always ORed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Command,
    CommandRegex,
    Path,
    FileSystem,
    NetworkAddress,
    Internet,
    UnixSocket,
    ProtocolState,
    Nfs,
    Pid,
    Pgid,
    Uid,
    Task,
    SolarisZone,
    SelinuxContext,
    Fd,
    LinkCount,
}

impl Category {
    /// Whether inclusive criteria in this category restrict the result.
    /// Task only toggles reporting of thread records.
    pub fn is_constraining(&self) -> bool {
        !matches!(self, Category::Task)
    }

    /// Whether the category tests open files rather than processes.
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            Category::Path
                | Category::FileSystem
                | Category::NetworkAddress
                | Category::Internet
                | Category::UnixSocket
                | Category::ProtocolState
                | Category::Nfs
                | Category::Fd
                | Category::LinkCount
        )
    }

    /// Path-based categories need the mount table bound before matching.
    pub fn needs_mounts(&self) -> bool {
        matches!(self, Category::Path | Category::FileSystem | Category::Nfs)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Command => "command",
            Category::CommandRegex => "command_regex",
            Category::Path => "path",
            Category::FileSystem => "file_system",
            Category::NetworkAddress => "network_address",
            Category::Internet => "internet",
            Category::UnixSocket => "unix_socket",
            Category::ProtocolState => "protocol_state",
            Category::Nfs => "nfs",
            Category::Pid => "pid",
            Category::Pgid => "pgid",
            Category::Uid => "uid",
            Category::Task => "task",
            Category::SolarisZone => "solaris_zone",
            Category::SelinuxContext => "selinux_context",
            Category::Fd => "fd",
            Category::LinkCount => "link_count",
        };
        write!(f, "{}", s)
    }
}

/// Inclusive numeric range; `None` on a side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumericRange {
    pub lo: Option<u64>,
    pub hi: Option<u64>,
}

impl NumericRange {
    pub const ANY: NumericRange = NumericRange { lo: None, hi: None };

    pub fn exact(value: u64) -> Self {
        Self {
            lo: Some(value),
            hi: Some(value),
        }
    }

    pub fn between(lo: u64, hi: u64) -> Self {
        Self {
            lo: Some(lo),
            hi: Some(hi),
        }
    }

    /// Build from signed bounds where -1 means unbounded.
    pub fn from_raw(lo: i64, hi: i64) -> Result<Self> {
        let bound = |v: i64| -> Result<Option<u64>> {
            match v {
                -1 => Ok(None),
                v if v < 0 => Err(Error::InvalidArgument(format!("negative bound {}", v))),
                v => Ok(Some(v as u64)),
            }
        };
        let range = Self {
            lo: bound(lo)?,
            hi: bound(hi)?,
        };
        if let (Some(lo), Some(hi)) = (range.lo, range.hi) {
            if lo > hi {
                return Err(Error::InvalidArgument(format!(
                    "range {}-{} is reversed",
                    lo, hi
                )));
            }
        }
        Ok(range)
    }

    pub fn contains(&self, value: u64) -> bool {
        self.lo.map_or(true, |lo| value >= lo) && self.hi.map_or(true, |hi| value <= hi)
    }
}

impl std::fmt::Display for NumericRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) if lo == hi => write!(f, "{}", lo),
            (Some(lo), Some(hi)) => write!(f, "{}-{}", lo, hi),
            (Some(lo), None) => write!(f, "{}-", lo),
            (None, Some(hi)) => write!(f, "-{}", hi),
            (None, None) => write!(f, "any"),
        }
    }
}

/// A compiled `/regex/[bix]` command pattern.
#[derive(Debug, Clone)]
pub struct CommandPattern {
    original: String,
    regex: Regex,
}

impl CommandPattern {
    /// Compile `/re/flags`. `i` makes the match case-insensitive; `b` and
    /// `x` are accepted and ignored since the engine is always extended.
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };

        let body = pattern
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with /"))?;
        let close = body.rfind('/').ok_or_else(|| invalid("missing closing /"))?;
        let (re, flags) = (&body[..close], &body[close + 1..]);
        if re.is_empty() {
            return Err(invalid("empty expression"));
        }

        let mut case_insensitive = false;
        for flag in flags.chars() {
            match flag {
                'i' => case_insensitive = true,
                'b' | 'x' => {}
                other => return Err(invalid(&format!("unknown flag {:?}", other))),
            }
        }

        let re_pattern = if case_insensitive {
            format!("(?i){}", re)
        } else {
            re.to_string()
        };
        let regex = Regex::new(&re_pattern).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            original: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

/// Options for path selections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFlags {
    /// Never treat the path as a file system, even if mounted on.
    pub only_files: bool,
    /// The path must name a mounted file system.
    pub only_file_systems: bool,
    /// Keep the path literally when it cannot be resolved, without a
    /// warning.
    pub accept_deleted: bool,
}

/// The file system a path selection stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountBinding {
    pub directory: PathBuf,
    pub device: Option<DeviceId>,
}

/// A path selection after symlink resolution against the probe and the
/// mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundPath {
    pub resolved: PathBuf,
    /// `(device, inode)` of the resolved path when stat succeeded.
    pub identity: Option<(DeviceId, u64)>,
    pub mount: Option<MountBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSelection {
    pub requested: PathBuf,
    pub flags: PathFlags,
    pub bound: Option<BoundPath>,
}

impl PathSelection {
    pub fn new(path: impl Into<PathBuf>, flags: PathFlags) -> Self {
        Self {
            requested: path.into(),
            flags,
            bound: None,
        }
    }

    fn matches(&self, file: &OpenFileRecord, mounts: Option<&MountTable>) -> bool {
        let Some(bound) = &self.bound else {
            return file.path() == Some(self.requested.as_path());
        };
        if let Some(mount) = &bound.mount {
            return on_file_system(file, mount, mounts);
        }
        if self.flags.only_file_systems {
            return false;
        }
        if let (Some((dev, ino)), Some(fdev), Some(fino)) =
            (bound.identity, file.device, file.inode)
        {
            return dev == fdev && ino == fino;
        }
        file.path()
            .is_some_and(|p| p == bound.resolved || p == self.requested)
    }
}

fn on_file_system(
    file: &OpenFileRecord,
    mount: &MountBinding,
    mounts: Option<&MountTable>,
) -> bool {
    if let (Some(mdev), Some(fdev)) = (mount.device, file.device) {
        return mdev == fdev;
    }
    let Some(path) = file.path() else {
        return false;
    };
    match mounts {
        Some(table) => table
            .containing(path)
            .is_some_and(|e| e.directory == mount.directory),
        None => path.starts_with(&mount.directory),
    }
}

/// File descriptor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdSelector {
    Kind(FdKind),
    Range(NumericRange),
}

impl FdSelector {
    /// Parse `cwd`, `txt`, `3` or `0-2`.
    pub fn parse(text: &str) -> Result<Self> {
        if let Some((lo, hi)) = text.split_once('-') {
            let bound = |s: &str| {
                s.parse::<u32>()
                    .map_err(|_| Error::InvalidArgument(format!("bad fd range {:?}", text)))
            };
            let (lo, hi) = (bound(lo)?, bound(hi)?);
            if lo > hi {
                return Err(Error::InvalidArgument(format!(
                    "fd range {}-{} is reversed",
                    lo, hi
                )));
            }
            return Ok(FdSelector::Range(NumericRange::between(
                u64::from(lo),
                u64::from(hi),
            )));
        }
        FdKind::parse(text)
            .map(FdSelector::Kind)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown fd {:?}", text)))
    }

    fn matches(&self, fd: FdKind) -> bool {
        match self {
            FdSelector::Kind(kind) => *kind == fd,
            FdSelector::Range(range) => fd.number().is_some_and(|n| range.contains(u64::from(n))),
        }
    }
}

/// What a criterion looks for.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Command name prefix.
    Command(String),
    CommandRegex(CommandPattern),
    Path(PathSelection),
    FileSystem(PathSelection),
    NetworkAddress(InetSpec),
    Internet(IpFamily),
    UnixSocket,
    /// Protocol and connection state, compared case-insensitively.
    ProtocolState {
        protocol: String,
        state: String,
    },
    Nfs,
    Pid(NumericRange),
    Pgid(NumericRange),
    Uid(NumericRange),
    Login(String),
    Task,
    SolarisZone(String),
    SelinuxContext(String),
    Fd(FdSelector),
    /// Files with fewer than this many links.
    LinkCount(u64),
}

impl Selector {
    pub fn pid(pid: u32) -> Self {
        Selector::Pid(NumericRange::exact(u64::from(pid)))
    }

    pub fn pgid(pgid: u32) -> Self {
        Selector::Pgid(NumericRange::exact(u64::from(pgid)))
    }

    pub fn uid(uid: u32) -> Self {
        Selector::Uid(NumericRange::exact(u64::from(uid)))
    }

    pub fn command(prefix: &str) -> Self {
        Selector::Command(prefix.to_string())
    }

    pub fn command_regex(pattern: &str) -> Result<Self> {
        CommandPattern::compile(pattern).map(Selector::CommandRegex)
    }

    /// A path; with `only_file_systems` it becomes a file-system selection.
    pub fn path(path: impl Into<PathBuf>, flags: PathFlags) -> Self {
        if flags.only_file_systems {
            Selector::FileSystem(PathSelection::new(path, flags))
        } else {
            Selector::Path(PathSelection::new(path, flags))
        }
    }

    pub fn file_system(path: impl Into<PathBuf>) -> Self {
        Selector::path(
            path,
            PathFlags {
                only_file_systems: true,
                ..PathFlags::default()
            },
        )
    }

    pub fn inet(spec: &str) -> Result<Self> {
        InetSpec::parse(spec).map(Selector::NetworkAddress)
    }

    /// `TCP:LISTEN` style.
    pub fn protocol_state(text: &str) -> Result<Self> {
        let (protocol, state) = text
            .split_once(':')
            .ok_or_else(|| {
                Error::InvalidArgument(format!("expected PROTO:STATE, got {:?}", text))
            })?;
        if !["tcp", "udp"].iter().any(|p| protocol.eq_ignore_ascii_case(p)) {
            return Err(Error::InvalidArgument(format!(
                "unsupported state protocol {:?}",
                protocol
            )));
        }
        if state.is_empty() {
            return Err(Error::InvalidArgument(format!("empty state in {:?}", text)));
        }
        Ok(Selector::ProtocolState {
            protocol: protocol.to_ascii_uppercase(),
            state: state.to_ascii_uppercase(),
        })
    }

    pub fn fd(text: &str) -> Result<Self> {
        FdSelector::parse(text).map(Selector::Fd)
    }

    pub fn category(&self) -> Category {
        match self {
            Selector::Command(_) => Category::Command,
            Selector::CommandRegex(_) => Category::CommandRegex,
            Selector::Path(_) => Category::Path,
            Selector::FileSystem(_) => Category::FileSystem,
            Selector::NetworkAddress(_) => Category::NetworkAddress,
            Selector::Internet(_) => Category::Internet,
            Selector::UnixSocket => Category::UnixSocket,
            Selector::ProtocolState { .. } => Category::ProtocolState,
            Selector::Nfs => Category::Nfs,
            Selector::Pid(_) => Category::Pid,
            Selector::Pgid(_) => Category::Pgid,
            Selector::Uid(_) | Selector::Login(_) => Category::Uid,
            Selector::Task => Category::Task,
            Selector::SolarisZone(_) => Category::SolarisZone,
            Selector::SelinuxContext(_) => Category::SelinuxContext,
            Selector::Fd(_) => Category::Fd,
            Selector::LinkCount(_) => Category::LinkCount,
        }
    }

    /// Human rendering of the argument, for status reports.
    pub fn argument(&self) -> String {
        match self {
            Selector::Command(prefix) => prefix.clone(),
            Selector::CommandRegex(pattern) => pattern.as_str().to_string(),
            Selector::Path(sel) | Selector::FileSystem(sel) => sel.requested.display().to_string(),
            Selector::NetworkAddress(spec) => spec.to_string(),
            Selector::Internet(family) => family.to_string(),
            Selector::UnixSocket => "unix".to_string(),
            Selector::ProtocolState { protocol, state } => format!("{}:{}", protocol, state),
            Selector::Nfs => "nfs".to_string(),
            Selector::Pid(r) | Selector::Pgid(r) | Selector::Uid(r) => r.to_string(),
            Selector::Login(name) => name.clone(),
            Selector::Task => "tasks".to_string(),
            Selector::SolarisZone(s) | Selector::SelinuxContext(s) => s.clone(),
            Selector::Fd(FdSelector::Kind(kind)) => kind.to_string(),
            Selector::Fd(FdSelector::Range(r)) => r.to_string(),
            Selector::LinkCount(n) => format!("<{}", n),
        }
    }

    pub(crate) fn path_selection_mut(&mut self) -> Option<&mut PathSelection> {
        match self {
            Selector::Path(sel) | Selector::FileSystem(sel) => Some(sel),
            _ => None,
        }
    }

    /// Evaluate this selector alone against a subject.
    pub fn matches(&self, subject: &Subject<'_>) -> bool {
        let process = subject.process;
        match self {
            Selector::Command(prefix) => process.command.starts_with(prefix.as_str()),
            Selector::CommandRegex(pattern) => pattern.is_match(&process.command),
            Selector::Pid(r) => r.contains(u64::from(process.pid.0)),
            Selector::Pgid(r) => r.contains(u64::from(process.pgid)),
            Selector::Uid(r) => r.contains(u64::from(process.uid)),
            Selector::Login(name) => process.login.as_deref() == Some(name.as_str()),
            Selector::Task => process.tid.is_some(),
            Selector::SolarisZone(zone) => process.solaris_zone.as_deref() == Some(zone.as_str()),
            Selector::SelinuxContext(ctx) => {
                process.selinux_context.as_deref() == Some(ctx.as_str())
            }
            _ => subject
                .file
                .is_some_and(|file| self.matches_file(file, subject.mounts)),
        }
    }

    fn matches_file(&self, file: &OpenFileRecord, mounts: Option<&MountTable>) -> bool {
        match self {
            Selector::Path(sel) | Selector::FileSystem(sel) => sel.matches(file, mounts),
            Selector::NetworkAddress(spec) => {
                file.network.as_ref().is_some_and(|n| spec.matches(n))
            }
            Selector::Internet(family) => {
                file.network.as_ref().is_some_and(|n| family.admits(n.family))
            }
            Selector::UnixSocket => file
                .network
                .as_ref()
                .is_some_and(|n| n.family == AddressFamily::Unix),
            Selector::ProtocolState { protocol, state } => file.network.as_ref().is_some_and(|n| {
                n.protocol.eq_ignore_ascii_case(protocol)
                    && n.state
                        .as_deref()
                        .is_some_and(|s| s.eq_ignore_ascii_case(state))
            }),
            Selector::Nfs => on_nfs(file, mounts),
            Selector::Fd(fd) => fd.matches(file.fd),
            Selector::LinkCount(limit) => file.link_count.is_some_and(|n| n < *limit),
            _ => false,
        }
    }
}

fn on_nfs(file: &OpenFileRecord, mounts: Option<&MountTable>) -> bool {
    let Some(table) = mounts else {
        return false;
    };
    if let Some(entry) = file.device.and_then(|dev| table.by_device(dev)) {
        return entry.is_nfs();
    }
    file.path()
        .and_then(|p| table.containing(p))
        .is_some_and(|e| e.is_nfs())
}

/// One stored criterion.
#[derive(Debug, Clone)]
pub struct Criterion {
    pub selector: Selector,
    pub exclude: bool,
    pub matched: bool,
}

impl Criterion {
    pub fn new(selector: Selector, exclude: bool) -> Self {
        Self {
            selector,
            exclude,
            matched: false,
        }
    }

    pub fn category(&self) -> Category {
        self.selector.category()
    }
}

/// What the evaluator looks at: a process, optionally one of its files,
/// and the mount table when it has been resolved.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub process: &'a ProcessInfo,
    pub file: Option<&'a OpenFileRecord>,
    pub mounts: Option<&'a MountTable>,
}

impl<'a> Subject<'a> {
    pub fn process(process: &'a ProcessInfo) -> Self {
        Self {
            process,
            file: None,
            mounts: None,
        }
    }

    pub fn file(process: &'a ProcessInfo, file: &'a OpenFileRecord) -> Self {
        Self {
            process,
            file: Some(file),
            mounts: None,
        }
    }

    pub fn with_mounts(mut self, mounts: Option<&'a MountTable>) -> Self {
        self.mounts = mounts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountEntry;
    use crate::record::{NetworkEndpoint, ProcessRecord};

    fn proc_info() -> ProcessInfo {
        ProcessRecord::new(100, "nginx")
            .with_uid(33, "www-data")
            .with_pgid(90)
            .info
    }

    #[test]
    fn test_range_from_raw() {
        let r = NumericRange::from_raw(-1, 10).unwrap();
        assert!(r.contains(0));
        assert!(r.contains(10));
        assert!(!r.contains(11));
        assert_eq!(r.to_string(), "-10");

        assert!(NumericRange::from_raw(5, -1).unwrap().contains(u64::MAX));
        assert!(NumericRange::from_raw(10, 5).is_err());
        assert!(NumericRange::from_raw(-2, 5).is_err());
    }

    #[test]
    fn test_command_pattern() {
        let p = CommandPattern::compile("/^NGI/i").unwrap();
        assert!(p.is_match("nginx"));
        assert!(CommandPattern::compile("/ngi/bx").unwrap().is_match("nginx"));
        assert!(!CommandPattern::compile("/^NGI/").unwrap().is_match("nginx"));

        for bad in ["ngi", "/ngi", "//", "/ngi/q", "/(/"] {
            assert!(
                matches!(CommandPattern::compile(bad), Err(Error::InvalidPattern { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_process_predicates() {
        let info = proc_info();
        let s = Subject::process(&info);
        assert!(Selector::command("ngi").matches(&s));
        assert!(!Selector::command("ginx").matches(&s));
        assert!(Selector::pid(100).matches(&s));
        assert!(Selector::pgid(90).matches(&s));
        assert!(Selector::uid(33).matches(&s));
        assert!(Selector::Login("www-data".into()).matches(&s));
        assert!(!Selector::Task.matches(&s));
        // file-level selectors never match a bare process
        assert!(!Selector::UnixSocket.matches(&s));
    }

    #[test]
    fn test_fd_selector() {
        let info = proc_info();
        let cwd = OpenFileRecord::new(FdKind::Cwd, "/srv");
        let three = OpenFileRecord::new(FdKind::Numeric(3), "/srv/a");

        let by_kind = Selector::fd("cwd").unwrap();
        assert!(by_kind.matches(&Subject::file(&info, &cwd)));
        assert!(!by_kind.matches(&Subject::file(&info, &three)));

        let by_range = Selector::fd("0-5").unwrap();
        assert!(by_range.matches(&Subject::file(&info, &three)));
        assert!(!by_range.matches(&Subject::file(&info, &cwd)));
        assert_eq!(by_range.argument(), "0-5");

        assert!(Selector::fd("bogus").is_err());
    }

    #[test]
    fn test_fd_range_bounds_stay_explicit() {
        let info = proc_info();
        let three = OpenFileRecord::new(FdKind::Numeric(3), "/srv/a");
        let top = OpenFileRecord::new(FdKind::Numeric(u32::MAX), "/srv/b");

        let high = Selector::fd("4294967295-4294967295").unwrap();
        assert_eq!(high.argument(), "4294967295");
        assert!(high.matches(&Subject::file(&info, &top)));
        assert!(!high.matches(&Subject::file(&info, &three)));

        for bad in [
            "18446744073709551615-18446744073709551615",
            "9223372036854775808-9223372036854775809",
            "4294967296-4294967296",
            "5-2",
            "-3",
            "3-",
        ] {
            assert!(
                matches!(Selector::fd(bad), Err(Error::InvalidArgument(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_protocol_state() {
        let info = proc_info();
        let listen = OpenFileRecord::new(FdKind::Numeric(6), "*:80").with_network(
            NetworkEndpoint::inet("TCP", "0.0.0.0:80".parse().unwrap(), None).with_state("LISTEN"),
        );
        assert!(Selector::protocol_state("tcp:listen")
            .unwrap()
            .matches(&Subject::file(&info, &listen)));
        assert!(!Selector::protocol_state("UDP:LISTEN")
            .unwrap()
            .matches(&Subject::file(&info, &listen)));
        assert!(Selector::protocol_state("LISTEN").is_err());
        assert!(Selector::protocol_state("SCTP:LISTEN").is_err());
    }

    #[test]
    fn test_link_count_and_unix() {
        let info = proc_info();
        let unlinked = OpenFileRecord::new(FdKind::Numeric(4), "/tmp/x").with_link_count(0);
        let linked = OpenFileRecord::new(FdKind::Numeric(5), "/tmp/y").with_link_count(1);
        assert!(Selector::LinkCount(1).matches(&Subject::file(&info, &unlinked)));
        assert!(!Selector::LinkCount(1).matches(&Subject::file(&info, &linked)));

        let sock =
            OpenFileRecord::new(FdKind::Numeric(7), "socket").with_network(NetworkEndpoint::unix());
        assert!(Selector::UnixSocket.matches(&Subject::file(&info, &sock)));
        assert!(!Selector::Internet(IpFamily::Any).matches(&Subject::file(&info, &sock)));
    }

    #[test]
    fn test_unbound_path_matches_literally() {
        let info = proc_info();
        let file = OpenFileRecord::new(FdKind::Numeric(3), "/var/log/syslog");
        let sel = Selector::path("/var/log/syslog", PathFlags::default());
        assert!(sel.matches(&Subject::file(&info, &file)));
        assert!(!Selector::path("/var/log", PathFlags::default())
            .matches(&Subject::file(&info, &file)));
    }

    #[test]
    fn test_bound_file_system_matches_by_device_or_prefix() {
        let info = proc_info();
        let mut table_entry = MountEntry::new("/var", "/dev/sdb1", "ext4");
        table_entry.device_id = Some(DeviceId(0x811));
        let table: MountTable = vec![MountEntry::new("/", "/dev/sda1", "ext4"), table_entry]
            .into_iter()
            .collect();

        let mut sel = PathSelection::new("/var", PathFlags::default());
        sel.bound = Some(BoundPath {
            resolved: PathBuf::from("/var"),
            identity: None,
            mount: Some(MountBinding {
                directory: PathBuf::from("/var"),
                device: Some(DeviceId(0x811)),
            }),
        });
        let selector = Selector::Path(sel);

        let on_dev = OpenFileRecord::new(FdKind::Numeric(3), "/var/lib/x").with_device(0x811, 12);
        let other_dev =
            OpenFileRecord::new(FdKind::Numeric(3), "/var/lib/x").with_device(0x801, 12);
        let no_dev = OpenFileRecord::new(FdKind::Numeric(3), "/var/tmp/y");
        let outside = OpenFileRecord::new(FdKind::Numeric(3), "/etc/passwd");

        let m = |f: &OpenFileRecord| {
            selector.matches(&Subject::file(&info, f).with_mounts(Some(&table)))
        };
        assert!(m(&on_dev));
        assert!(!m(&other_dev));
        assert!(m(&no_dev));
        assert!(!m(&outside));
    }

    #[test]
    fn test_nfs_selector_uses_mount_kind() {
        let info = proc_info();
        let table: MountTable = vec![
            MountEntry::new("/", "/dev/sda1", "ext4"),
            MountEntry::new("/net/home", "srv:/home", "nfs4"),
        ]
        .into_iter()
        .collect();
        let nfs_file = OpenFileRecord::new(FdKind::Numeric(3), "/net/home/a");
        let local = OpenFileRecord::new(FdKind::Numeric(3), "/etc/a");

        let s = |f| Subject::file(&info, f).with_mounts(Some(&table));
        assert!(Selector::Nfs.matches(&s(&nfs_file)));
        assert!(!Selector::Nfs.matches(&s(&local)));
        // without a table nothing is known to be NFS
        assert!(!Selector::Nfs.matches(&Subject::file(&info, &nfs_file)));
    }
}
