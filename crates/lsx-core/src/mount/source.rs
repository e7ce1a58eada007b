//! Where raw mount-table lines come from.

use std::path::{Path, PathBuf};

use lsx_common::{Error, Result};

/// Supplies raw mount table lines (`<source> <dir> <type> ...`).
pub trait MountSource {
    fn read_lines(&self) -> Result<Vec<Vec<u8>>>;

    /// Human description for logs.
    fn describe(&self) -> String;
}

/// Reads a proc-style mounts file.
#[derive(Debug, Clone)]
pub struct ProcMountSource {
    path: PathBuf,
}

impl ProcMountSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MountSource for ProcMountSource {
    fn read_lines(&self) -> Result<Vec<Vec<u8>>> {
        let content = std::fs::read(&self.path)
            .map_err(|e| Error::Discovery(format!("can't read {}: {}", self.path.display(), e)))?;
        Ok(split_lines(&content))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Lines held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticMountSource {
    lines: Vec<Vec<u8>>,
}

impl StaticMountSource {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        Self {
            lines: lines.into_iter().map(|l| l.as_ref().to_vec()).collect(),
        }
    }

    /// Split a whole mounts file.
    pub fn from_content(content: &str) -> Self {
        Self {
            lines: split_lines(content.as_bytes()),
        }
    }
}

impl MountSource for StaticMountSource {
    fn read_lines(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.lines.clone())
    }

    fn describe(&self) -> String {
        format!("{} static lines", self.lines.len())
    }
}

fn split_lines(content: &[u8]) -> Vec<Vec<u8>> {
    content
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}
