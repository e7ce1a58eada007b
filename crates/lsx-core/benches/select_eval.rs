//! Criterion benchmarks for the selection evaluator and mount resolution.
//!
//! Everything runs against in-memory records and probes so results do not
//! depend on the host.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lsx_config::ExemptionList;
use lsx_core::mount::{MountResolver, Supplement};
use lsx_core::probe::MapProbe;
use lsx_core::record::{FdKind, NetworkEndpoint, OpenFileRecord, ProcessRecord};
use lsx_core::select::{PathFlags, SelectionStore, Selector, Subject};
use lsx_core::warnings::Warnings;

fn records(n: u32) -> Vec<ProcessRecord> {
    (0..n)
        .map(|pid| {
            ProcessRecord::new(pid + 1, if pid % 3 == 0 { "nginx" } else { "worker" })
                .with_uid(1000 + pid % 4, "user")
                .with_file(OpenFileRecord::new(FdKind::Cwd, "/srv"))
                .with_file(OpenFileRecord::new(FdKind::Numeric(3), "/var/log/app.log"))
                .with_file(
                    OpenFileRecord::new(FdKind::Numeric(4), "*:8080").with_network(
                        NetworkEndpoint::inet("TCP", "0.0.0.0:8080".parse().unwrap(), None)
                            .with_state("LISTEN"),
                    ),
                )
        })
        .collect()
}

fn store(and_mode: bool) -> SelectionStore {
    let mut store = SelectionStore::new();
    store.add(Selector::command("ngi"), false).unwrap();
    store.add(Selector::uid(1001), false).unwrap();
    store
        .add(Selector::path("/var/log/app.log", PathFlags::default()), false)
        .unwrap();
    store.add(Selector::inet("TCP:8080").unwrap(), false).unwrap();
    store.add(Selector::pid(7), true).unwrap();
    store.set_mode(and_mode).unwrap();
    store.freeze();
    store
}

fn bench_evaluate(c: &mut Criterion) {
    let records = records(1_000);
    let mut group = c.benchmark_group("select_eval");

    for (name, and_mode) in [("or", false), ("and", true)] {
        group.bench_with_input(BenchmarkId::new("evaluate", name), &and_mode, |b, &mode| {
            let mut store = store(mode);
            b.iter(|| {
                let mut included = 0usize;
                for record in &records {
                    for file in &record.files {
                        if store.evaluate(&Subject::file(&record.info, file)) {
                            included += 1;
                        }
                    }
                }
                black_box(included);
            });
        });
    }

    group.finish();
}

fn bench_resolve_mounts(c: &mut Criterion) {
    let mut probe = MapProbe::new();
    let mut lines = Vec::new();
    for i in 0..200u64 {
        let dir = format!("/mnt/vol{}", i);
        probe = probe.with_dir(dir.clone(), 0x800 + i, 2);
        lines.push(format!("/dev/vd{} {} ext4 rw 0 0", i, dir));
    }
    let exemptions = ExemptionList::new();

    c.bench_function("select_eval/resolve_200_mounts", |b| {
        b.iter(|| {
            let mut supplement = Supplement::new(None);
            let mut warnings = Warnings::new(false);
            let table = MountResolver::new(&probe, &exemptions, &mut supplement, &mut warnings)
                .resolve_lines(black_box(&lines));
            black_box(table.len());
        })
    });
}

criterion_group!(benches, bench_evaluate, bench_resolve_mounts);
criterion_main!(benches);
