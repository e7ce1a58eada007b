//! Fuzz target for mount table octal escape decoding.
//!
//! Decoding must not panic and never produces more bytes than it was given.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lsx_core::mount::decode_octal_escapes;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some(out)) = decode_octal_escapes(data) {
        assert!(out.len() <= data.len());
    }
});
