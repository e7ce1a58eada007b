//! Fuzz target for mount table resolution.
//!
//! Arbitrary lines are resolved against an in-memory probe that knows `/`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lsx_config::ExemptionList;
use lsx_core::mount::{MountResolver, Supplement};
use lsx_core::probe::MapProbe;
use lsx_core::warnings::Warnings;

fuzz_target!(|data: &[u8]| {
    let probe = MapProbe::new().with_dir("/", 0x801, 2);
    let exemptions = ExemptionList::new();
    let mut supplement = Supplement::new(None);
    let mut warnings = Warnings::new(true);

    let table = MountResolver::new(&probe, &exemptions, &mut supplement, &mut warnings)
        .resolve_lines(data.split(|b| *b == b'\n'));

    // One entry per directory, whatever the input.
    for (idx, entry) in table.iter().enumerate() {
        assert!(table.iter().skip(idx + 1).all(|e| e.directory != entry.directory));
    }
});
