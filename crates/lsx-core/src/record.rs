//! Process and open-file records handed to lsx by platform discovery.
//!
//! These are read-only input to selection. Optional fields are `None` when
//! discovery could not determine them; a device of `None` is unknown, not
//! zero.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use lsx_common::{DeviceId, ProcessId};

/// What a file descriptor slot refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "number")]
pub enum FdKind {
    Numeric(u32),
    Cwd,
    RootDir,
    ParentDir,
    ProgramText,
    LibraryText,
    Memory,
    MmapDevice,
    Deleted,
    TaskCwd,
    Ctty,
    Error,
    NoFd,
    Unknown,
}

impl FdKind {
    /// Parse the short names used in FD columns (`cwd`, `txt`, `12`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        if let Ok(n) = name.parse::<u32>() {
            return Some(FdKind::Numeric(n));
        }
        let kind = match name {
            "cwd" => FdKind::Cwd,
            "rtd" => FdKind::RootDir,
            "pd" => FdKind::ParentDir,
            "txt" => FdKind::ProgramText,
            "ltx" => FdKind::LibraryText,
            "mem" => FdKind::Memory,
            "mmap" => FdKind::MmapDevice,
            "DEL" | "del" => FdKind::Deleted,
            "tcwd" => FdKind::TaskCwd,
            "ctty" => FdKind::Ctty,
            "err" => FdKind::Error,
            "NOFD" | "nofd" => FdKind::NoFd,
            "unknown" => FdKind::Unknown,
            _ => return None,
        };
        Some(kind)
    }

    pub fn number(&self) -> Option<u32> {
        match self {
            FdKind::Numeric(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for FdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FdKind::Numeric(n) => return write!(f, "{}", n),
            FdKind::Cwd => "cwd",
            FdKind::RootDir => "rtd",
            FdKind::ParentDir => "pd",
            FdKind::ProgramText => "txt",
            FdKind::LibraryText => "ltx",
            FdKind::Memory => "mem",
            FdKind::MmapDevice => "mmap",
            FdKind::Deleted => "DEL",
            FdKind::TaskCwd => "tcwd",
            FdKind::Ctty => "ctty",
            FdKind::Error => "err",
            FdKind::NoFd => "NOFD",
            FdKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Regular,
    Directory,
    Block,
    Char,
    Fifo,
    Link,
    Socket,
    Unix,
    Ipv4,
    Ipv6,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    Inet,
    Inet6,
    Unix,
}

/// Socket details of an open file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub family: AddressFamily,
    /// Protocol name as reported, e.g. `TCP`.
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<SocketAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign: Option<SocketAddr>,
    /// Connection state, e.g. `LISTEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl NetworkEndpoint {
    pub fn inet(protocol: &str, local: SocketAddr, foreign: Option<SocketAddr>) -> Self {
        let family = if local.is_ipv4() {
            AddressFamily::Inet
        } else {
            AddressFamily::Inet6
        };
        Self {
            family,
            protocol: protocol.to_string(),
            local: Some(local),
            foreign,
            state: None,
        }
    }

    pub fn unix() -> Self {
        Self {
            family: AddressFamily::Unix,
            protocol: "unix".to_string(),
            local: None,
            foreign: None,
            state: None,
        }
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    pub fn is_inet(&self) -> bool {
        matches!(self.family, AddressFamily::Inet | AddressFamily::Inet6)
    }
}

/// One open file of a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFileRecord {
    pub fd: FdKind,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_device: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inode: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_count: Option<u64>,
    /// Path, or a description for files without one.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkEndpoint>,
}

impl OpenFileRecord {
    pub fn new(fd: FdKind, name: impl Into<String>) -> Self {
        Self {
            fd,
            access: Access::None,
            file_type: FileType::Unknown,
            device: None,
            raw_device: None,
            inode: None,
            size: None,
            offset: None,
            link_count: None,
            name: name.into(),
            network: None,
        }
    }

    /// The name as a path, if it looks like one.
    pub fn path(&self) -> Option<&Path> {
        self.name.starts_with('/').then(|| Path::new(&self.name))
    }

    pub fn with_device(mut self, dev: u64, inode: u64) -> Self {
        self.device = Some(DeviceId(dev));
        self.inode = Some(inode);
        self
    }

    pub fn with_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_link_count(mut self, links: u64) -> Self {
        self.link_count = Some(links);
        self
    }

    pub fn with_network(mut self, endpoint: NetworkEndpoint) -> Self {
        self.file_type = match endpoint.family {
            AddressFamily::Inet => FileType::Ipv4,
            AddressFamily::Inet6 => FileType::Ipv6,
            AddressFamily::Unix => FileType::Unix,
        };
        self.network = Some(endpoint);
        self
    }
}

/// Process-level attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    /// Set for task (thread) records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_command: Option<String>,
    pub command: String,
    #[serde(default)]
    pub pgid: u32,
    #[serde(default)]
    pub ppid: u32,
    #[serde(default)]
    pub uid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solaris_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selinux_context: Option<String>,
}

/// A discovered process with its open files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    #[serde(flatten)]
    pub info: ProcessInfo,
    #[serde(default)]
    pub files: Vec<OpenFileRecord>,
    /// Discovery has process-level attributes worth reporting even when no
    /// file survives selection.
    #[serde(default)]
    pub report_without_files: bool,
}

impl ProcessRecord {
    pub fn new(pid: u32, command: impl Into<String>) -> Self {
        Self {
            info: ProcessInfo {
                pid: ProcessId(pid),
                tid: None,
                task_command: None,
                command: command.into(),
                pgid: pid,
                ppid: 0,
                uid: 0,
                login: None,
                solaris_zone: None,
                selinux_context: None,
            },
            files: Vec::new(),
            report_without_files: false,
        }
    }

    pub fn with_uid(mut self, uid: u32, login: &str) -> Self {
        self.info.uid = uid;
        self.info.login = Some(login.to_string());
        self
    }

    pub fn with_pgid(mut self, pgid: u32) -> Self {
        self.info.pgid = pgid;
        self
    }

    pub fn with_ppid(mut self, ppid: u32) -> Self {
        self.info.ppid = ppid;
        self
    }

    pub fn with_task(mut self, tid: u32, command: &str) -> Self {
        self.info.tid = Some(tid);
        self.info.task_command = Some(command.to_string());
        self
    }

    pub fn with_zone(mut self, zone: &str) -> Self {
        self.info.solaris_zone = Some(zone.to_string());
        self
    }

    pub fn with_selinux_context(mut self, context: &str) -> Self {
        self.info.selinux_context = Some(context.to_string());
        self
    }

    pub fn with_file(mut self, file: OpenFileRecord) -> Self {
        self.files.push(file);
        self
    }

    pub fn reporting_without_files(mut self) -> Self {
        self.report_without_files = true;
        self
    }
}
