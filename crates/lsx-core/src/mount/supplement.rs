//! Mount supplement: a caller-supplied map from mount point to device
//! number, consulted when stat(2) of a mount point fails.
//!
//! File format, one entry per line:
//!
//! ```text
//! /home 0x803
//! /net/build 0x2b
//! ```
//!
//! Any malformed line, or two lines giving different devices for the same
//! path, disables the supplement for the rest of the context's life. An
//! exact duplicate line is ignored.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use lsx_common::DeviceId;
use thiserror::Error;
use tracing::{debug, info};

use crate::logging::event_names;
use crate::warnings::{WarningKind, Warnings};

#[derive(Debug, Error)]
pub enum SupplementError {
    #[error("line {line}: no path: {text:?}")]
    NoPath { line: usize, text: String },

    #[error("line {line}: no device: {text:?}")]
    NoDevice { line: usize, text: String },

    #[error("line {line}: illegal device: {text:?}")]
    IllegalDevice { line: usize, text: String },

    #[error("line {line}: path duplicate of line {first_line}: {text:?}")]
    Conflict {
        line: usize,
        first_line: usize,
        text: String,
    },

    #[error("can't read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SupplementError {
    pub fn line(&self) -> Option<usize> {
        match self {
            SupplementError::NoPath { line, .. }
            | SupplementError::NoDevice { line, .. }
            | SupplementError::IllegalDevice { line, .. }
            | SupplementError::Conflict { line, .. } => Some(*line),
            SupplementError::Unreadable { .. } => None,
        }
    }
}

impl From<SupplementError> for lsx_common::Error {
    fn from(err: SupplementError) -> Self {
        match err {
            SupplementError::Unreadable { source, .. } => lsx_common::Error::Io(source),
            other => lsx_common::Error::SupplementCorrupt {
                line: other.line().unwrap_or(0),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementEntry {
    pub path: PathBuf,
    pub device: DeviceId,
    /// 1-based line in the supplement file.
    pub line: usize,
}

/// Parsed supplement entries keyed by path.
#[derive(Debug, Clone, Default)]
pub struct SupplementTable {
    entries: HashMap<PathBuf, SupplementEntry>,
}

impl SupplementTable {
    /// Parse supplement content. Every problem is reported, not just the
    /// first.
    pub fn parse(content: &[u8]) -> Result<Self, Vec<SupplementError>> {
        let mut table = SupplementTable::default();
        let mut errors = Vec::new();

        let content = content.strip_suffix(b"\n").unwrap_or(content);
        if content.is_empty() {
            return Ok(table);
        }

        for (idx, raw) in content.split(|b| *b == b'\n').enumerate() {
            let line = idx + 1;
            match parse_line(raw, line) {
                Ok(entry) => {
                    if let Err(err) = table.insert(entry, raw) {
                        errors.push(err);
                    }
                }
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(table)
        } else {
            Err(errors)
        }
    }

    fn insert(&mut self, entry: SupplementEntry, raw: &[u8]) -> Result<(), SupplementError> {
        if let Some(existing) = self.entries.get(&entry.path) {
            if existing.device == entry.device {
                return Ok(());
            }
            return Err(SupplementError::Conflict {
                line: entry.line,
                first_line: existing.line,
                text: String::from_utf8_lossy(raw).into_owned(),
            });
        }
        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    pub fn lookup(&self, dir: &Path) -> Option<&SupplementEntry> {
        self.entries.get(dir)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(raw: &[u8], line: usize) -> Result<SupplementEntry, SupplementError> {
    let text = || String::from_utf8_lossy(raw).into_owned();

    if raw.first() != Some(&b'/') {
        return Err(SupplementError::NoPath { line, text: text() });
    }

    let space = raw
        .iter()
        .position(|b| *b == b' ')
        .ok_or_else(|| SupplementError::NoDevice { line, text: text() })?;
    let (path, rest) = (&raw[..space], &raw[space + 1..]);
    if !rest.starts_with(b"0x") {
        return Err(SupplementError::NoDevice { line, text: text() });
    }

    let device = std::str::from_utf8(rest)
        .ok()
        .and_then(DeviceId::parse_hex)
        .ok_or_else(|| SupplementError::IllegalDevice { line, text: text() })?;

    Ok(SupplementEntry {
        path: PathBuf::from(OsStr::from_bytes(path)),
        device,
        line,
    })
}

#[derive(Debug)]
enum State {
    NotConfigured,
    /// Configured, not read yet.
    Pending,
    Loaded(SupplementTable),
    Disabled,
}

/// Lazily loaded supplement owned by a context.
#[derive(Debug)]
pub struct Supplement {
    path: Option<PathBuf>,
    state: State,
}

impl Supplement {
    pub fn new(path: Option<PathBuf>) -> Self {
        let state = if path.is_some() {
            State::Pending
        } else {
            State::NotConfigured
        };
        Self { path, state }
    }

    /// A supplement with an already parsed table.
    pub fn from_table(table: SupplementTable) -> Self {
        Self {
            path: None,
            state: State::Loaded(table),
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self.state, State::NotConfigured)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, State::Disabled)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up the device for a mount point, reading the file on first use.
    pub fn lookup(&mut self, dir: &Path, warnings: &mut Warnings) -> Option<DeviceId> {
        if matches!(self.state, State::Pending) {
            self.load(warnings);
        }
        match &self.state {
            State::Loaded(table) => table.lookup(dir).map(|entry| entry.device),
            _ => None,
        }
    }

    fn load(&mut self, warnings: &mut Warnings) {
        let Some(path) = self.path.clone() else {
            self.state = State::NotConfigured;
            return;
        };

        let parsed = std::fs::read(&path)
            .map_err(|source| {
                vec![SupplementError::Unreadable {
                    path: path.clone(),
                    source,
                }]
            })
            .and_then(|content| SupplementTable::parse(&content));

        match parsed {
            Ok(table) => {
                info!(
                    target: event_names::SUPPLEMENT_LOADED,
                    path = %path.display(),
                    entries = table.len() as u64,
                    "mount supplement loaded"
                );
                self.state = State::Loaded(table);
            }
            Err(errors) => {
                for err in &errors {
                    warnings.record(
                        WarningKind::SupplementCorrupt,
                        format!("{}: {}", path.display(), err),
                        Some(&path),
                    );
                }
                debug!(
                    target: event_names::SUPPLEMENT_DISABLED,
                    path = %path.display(),
                    problems = errors.len() as u64,
                    "mount supplement disabled"
                );
                self.state = State::Disabled;
            }
        }
    }
}
