//! End-to-end gather runs against in-memory mounts, probes and discovery.

use lsx_common::{Error, Result};
use lsx_config::GatherOptions;
use lsx_core::mount::StaticMountSource;
use lsx_core::probe::MapProbe;
use lsx_core::record::{FdKind, NetworkEndpoint, OpenFileRecord, ProcessRecord};
use lsx_core::{
    Category, Context, Discovery, GatherResult, PathFlags, Selector, StaticDiscovery,
    WarningKind,
};

const MOUNTS: &str = "\
/dev/sda1 / ext4 rw 0 0
/dev/sdb1 /data xfs rw 0 0
srv:/home /net/home nfs4 rw 0 0
";

fn probe() -> MapProbe {
    MapProbe::new()
        .with_dir("/", 0x801, 2)
        .with_dir("/data", 0x811, 2)
        .with_dir("/net/home", 0x2a, 1)
        .with_dir("/var/log", 0x801, 50)
}

fn context(options: GatherOptions) -> Context {
    Context::new(options)
        .unwrap()
        .with_probe(Box::new(probe()))
        .with_mount_source(Box::new(StaticMountSource::from_content(MOUNTS)))
}

fn records() -> Vec<ProcessRecord> {
    vec![
        ProcessRecord::new(100, "sshd")
            .with_uid(0, "root")
            .with_file(OpenFileRecord::new(FdKind::Cwd, "/"))
            .with_file(
                OpenFileRecord::new(FdKind::Numeric(3), "*:22").with_network(
                    NetworkEndpoint::inet("TCP", "0.0.0.0:22".parse().unwrap(), None)
                        .with_state("LISTEN"),
                ),
            ),
        ProcessRecord::new(200, "rsyslogd")
            .with_uid(0, "root")
            .with_file(OpenFileRecord::new(FdKind::Cwd, "/var/log"))
            .with_file(OpenFileRecord::new(FdKind::Numeric(5), "/data/db/wal")),
        ProcessRecord::new(300, "vim")
            .with_uid(1000, "alice")
            .with_file(OpenFileRecord::new(FdKind::Cwd, "/net/home/alice"))
            .with_file(OpenFileRecord::new(FdKind::Numeric(4), "/net/home/alice/notes.txt")),
        ProcessRecord::new(300, "vim")
            .with_uid(1000, "alice")
            .with_task(301, "vim-io")
            .with_file(OpenFileRecord::new(FdKind::Cwd, "/net/home/alice")),
    ]
}

fn gather(ctx: &mut Context) -> GatherResult {
    ctx.freeze();
    ctx.gather(&mut StaticDiscovery::new(records())).unwrap()
}

fn pids(result: &GatherResult) -> Vec<u32> {
    result.processes.iter().map(|p| p.info.pid.0).collect()
}

#[test]
fn test_gather_requires_frozen_context() {
    let mut ctx = context(GatherOptions::default());
    let err = ctx.gather(&mut StaticDiscovery::new(records())).unwrap_err();
    assert!(matches!(err, Error::NotFrozen));
}

#[test]
fn test_no_selection_reports_everything_but_tasks() {
    let mut ctx = context(GatherOptions::default());
    let result = gather(&mut ctx);

    assert_eq!(pids(&result), vec![100, 200, 300]);
    assert!(result.processes.iter().all(|p| p.info.tid.is_none()));
    assert_eq!(result.metadata.file_count, 6);
    assert!(result.selections.is_empty());
    // no path criteria, so the mount table was never needed
    assert_eq!(result.metadata.mount_count, None);
    assert!(ctx.mounts().is_none());
}

#[test]
fn test_exclusion_only_pid() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::pid(100), true).unwrap();
    let result = gather(&mut ctx);

    assert_eq!(pids(&result), vec![200, 300]);
    assert!(result.selections[0].matched);
}

#[test]
fn test_uid_or_path() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::uid(1000), false).unwrap();
    ctx.add_selection(Selector::path("/var/log", PathFlags::default()), false)
        .unwrap();
    let result = gather(&mut ctx);

    assert_eq!(pids(&result), vec![200, 300]);
    let syslog = &result.processes[0];
    assert_eq!(syslog.files.len(), 1);
    assert_eq!(syslog.files[0].name, "/var/log");
    assert_eq!(result.processes[1].files.len(), 2);
}

#[test]
fn test_uid_and_path() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::uid(1000), false).unwrap();
    ctx.add_selection(Selector::path("/var/log", PathFlags::default()), false)
        .unwrap();
    ctx.set_and_mode(true).unwrap();
    let result = gather(&mut ctx);

    assert!(result.processes.is_empty());
    // both criteria still fired on some record
    assert!(result.selections.iter().all(|s| s.matched));
}

#[test]
fn test_unmatched_criterion_reported() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::command("sshd"), false).unwrap();
    ctx.add_selection(Selector::command("postgres"), false).unwrap();
    let result = gather(&mut ctx);

    assert_eq!(pids(&result), vec![100]);
    let unmatched: Vec<_> = result.unmatched().map(|s| s.argument.as_str()).collect();
    assert_eq!(unmatched, vec!["postgres"]);
}

#[test]
fn test_matched_flags_reset_between_gathers() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::command("sshd"), false).unwrap();
    ctx.freeze();

    let first = ctx.gather(&mut StaticDiscovery::new(records())).unwrap();
    assert!(first.selections[0].matched);

    let second = ctx
        .gather(&mut StaticDiscovery::new(vec![ProcessRecord::new(9, "cron")
            .with_file(OpenFileRecord::new(FdKind::Cwd, "/"))]))
        .unwrap();
    assert!(second.processes.is_empty());
    assert!(!second.selections[0].matched);
}

#[test]
fn test_file_system_selection_uses_annotated_device() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::file_system("/data"), false).unwrap();
    let result = gather(&mut ctx);

    assert_eq!(pids(&result), vec![200]);
    let wal = &result.processes[0].files[0];
    assert_eq!(wal.name, "/data/db/wal");
    assert_eq!(wal.device.map(|d| d.0), Some(0x811));
    assert_eq!(result.metadata.mount_count, Some(3));
}

#[test]
fn test_nfs_selection() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::Nfs, false).unwrap();
    let result = gather(&mut ctx);

    assert_eq!(pids(&result), vec![300]);
    assert_eq!(result.processes[0].files.len(), 2);
}

#[test]
fn test_tasks_reported_only_when_selected() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::Task, false).unwrap();
    ctx.add_selection(Selector::uid(1000), false).unwrap();
    let result = gather(&mut ctx);

    assert_eq!(result.processes.len(), 2);
    assert_eq!(result.processes[1].info.tid, Some(301));
    let task = result
        .selections
        .iter()
        .find(|s| s.category == Category::Task)
        .unwrap();
    assert!(task.matched);
}

#[test]
fn test_task_marked_matched_even_when_task_record_excluded() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::Task, false).unwrap();
    ctx.add_selection(Selector::pid(300), true).unwrap();
    let result = gather(&mut ctx);

    assert!(result.processes.iter().all(|p| p.info.pid.0 != 300));
    let task = result
        .selections
        .iter()
        .find(|s| s.category == Category::Task)
        .unwrap();
    assert!(task.matched);
}

#[test]
fn test_protocol_state_exclusion() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::protocol_state("TCP:LISTEN").unwrap(), true)
        .unwrap();
    let result = gather(&mut ctx);

    let sshd = &result.processes[0];
    assert_eq!(sshd.info.pid.0, 100);
    assert_eq!(sshd.files.len(), 1);
    assert_eq!(sshd.files[0].fd, FdKind::Cwd);
}

#[test]
fn test_process_without_files_needs_process_only_selection() {
    let lonely = || {
        vec![ProcessRecord::new(42, "zombie")
            .with_uid(1000, "alice")
            .reporting_without_files()]
    };

    let mut by_pid = context(GatherOptions::default());
    by_pid.add_selection(Selector::pid(42), false).unwrap();
    by_pid.freeze();
    let result = by_pid.gather(&mut StaticDiscovery::new(lonely())).unwrap();
    assert_eq!(pids(&result), vec![42]);
    assert!(result.processes[0].files.is_empty());

    let mut with_fd = context(GatherOptions::default());
    with_fd.add_selection(Selector::pid(42), false).unwrap();
    with_fd.add_selection(Selector::fd("cwd").unwrap(), false).unwrap();
    with_fd.freeze();
    let result = with_fd.gather(&mut StaticDiscovery::new(lonely())).unwrap();
    assert!(result.processes.is_empty());

    let mut unflagged = context(GatherOptions::default());
    unflagged.add_selection(Selector::pid(42), false).unwrap();
    unflagged.freeze();
    let result = unflagged
        .gather(&mut StaticDiscovery::new(vec![ProcessRecord::new(42, "zombie")]))
        .unwrap();
    assert!(result.processes.is_empty());
}

#[test]
fn test_unresolved_path_warning_in_result() {
    let mut ctx = context(GatherOptions::default().with_warnings(true));
    ctx.add_selection(Selector::path("/no/such/file", PathFlags::default()), false)
        .unwrap();
    let result = gather(&mut ctx);

    assert!(result.processes.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::SelectionUnresolved));
    assert!(!result.selections[0].matched);
}

#[test]
fn test_warnings_suppressed_by_default() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::path("/no/such/file", PathFlags::default()), false)
        .unwrap();
    let result = gather(&mut ctx);
    assert!(result.warnings.is_empty());
}

struct FailingDiscovery;

impl Discovery for FailingDiscovery {
    fn processes(&mut self) -> Result<Vec<ProcessRecord>> {
        Err(Error::NoMemory("process table".to_string()))
    }
}

#[test]
fn test_allocation_failure_returned_without_exit_on_fatal() {
    let mut ctx = context(GatherOptions::default());
    ctx.freeze();
    let err = ctx.gather(&mut FailingDiscovery).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::NoMemory(_)));
}

#[test]
fn test_result_json_shape() {
    let mut ctx = context(GatherOptions::default());
    ctx.add_selection(Selector::pid(100), false).unwrap();
    let result = gather(&mut ctx);

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["processes"][0]["pid"], 100);
    assert_eq!(json["processes"][0]["command"], "sshd");
    assert_eq!(json["selections"][0]["category"], "pid");
    assert_eq!(json["selections"][0]["matched"], true);
    assert!(json["metadata"]["run_id"].as_str().unwrap().starts_with("run-"));
    assert!(json.get("warnings").is_none());
}
