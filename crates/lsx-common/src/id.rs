//! Process and device identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

/// Device number as reported by stat(2) `st_dev` / `st_rdev`.
///
/// Displays in the hexadecimal form used by mount supplement files
/// (`0x803`). Major/minor split follows the Linux `dev_t` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// Parse the `0x<hex>` form. `0x` alone is device zero.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("0x")?;
        if digits.is_empty() {
            return Some(DeviceId(0));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(DeviceId)
    }

    /// Major device number.
    pub fn major(&self) -> u32 {
        (((self.0 >> 32) & 0xffff_f000) | ((self.0 >> 8) & 0x0000_0fff)) as u32
    }

    /// Minor device number.
    pub fn minor(&self) -> u32 {
        (((self.0 >> 12) & 0xffff_ff00) | (self.0 & 0x0000_00ff)) as u32
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(dev: u64) -> Self {
        DeviceId(dev)
    }
}
