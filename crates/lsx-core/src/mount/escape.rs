//! Octal escape decoding for kernel-reported paths.
//!
//! The kernel writes space, tab, newline and backslash in mount table
//! fields as `\ooo` (three octal digits). A backslash that is not followed
//! by exactly three octal digits is kept as-is.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use thiserror::Error;

/// Bytes added to the output buffer each time it fills.
pub const GROWTH_INCREMENT: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscapeError {
    #[error("can't allocate {requested} bytes for octal-escaping")]
    NoMemory { requested: usize },
}

impl From<EscapeError> for lsx_common::Error {
    fn from(err: EscapeError) -> Self {
        lsx_common::Error::NoMemory(err.to_string())
    }
}

/// Decode `\ooo` sequences.
///
/// Returns `Ok(None)` for empty input, which is distinct from a decode that
/// produced an empty result (the latter cannot happen for non-empty input).
pub fn decode_octal_escapes(input: &[u8]) -> Result<Option<Vec<u8>>, EscapeError> {
    if input.is_empty() {
        return Ok(None);
    }

    let mut out = Vec::new();
    let mut idx = 0;
    while idx < input.len() {
        let mut byte = input[idx];
        let mut consumed = 1;
        if byte == b'\\' {
            if let Some(value) = octal_triplet(&input[idx + 1..]) {
                byte = value;
                consumed = 4;
            }
        }
        push_byte(&mut out, byte)?;
        idx += consumed;
    }

    Ok(Some(out))
}

/// Decode into a path. Same `None` rule as [`decode_octal_escapes`].
pub fn decode_path(input: &[u8]) -> Result<Option<PathBuf>, EscapeError> {
    Ok(decode_octal_escapes(input)?.map(|bytes| PathBuf::from(OsString::from_vec(bytes))))
}

fn octal_triplet(rest: &[u8]) -> Option<u8> {
    let digits = rest.get(..3)?;
    let mut value: u32 = 0;
    for &digit in digits {
        if !(b'0'..=b'7').contains(&digit) {
            return None;
        }
        value = (value << 3) | u32::from(digit - b'0');
    }
    // \400 and above wrap to a single byte
    Some((value & 0xff) as u8)
}

fn push_byte(out: &mut Vec<u8>, byte: u8) -> Result<(), EscapeError> {
    if out.len() == out.capacity() {
        out.try_reserve_exact(GROWTH_INCREMENT)
            .map_err(|_| EscapeError::NoMemory {
                requested: out.capacity().saturating_add(GROWTH_INCREMENT),
            })?;
    }
    out.push(byte);
    Ok(())
}
