//! Fuzz target for mount supplement parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lsx_core::mount::SupplementTable;

fuzz_target!(|data: &[u8]| {
    // Either a table or a non-empty list of problems
    match SupplementTable::parse(data) {
        Ok(table) => {
            let _ = table.len();
        }
        Err(errors) => assert!(!errors.is_empty()),
    }
});
