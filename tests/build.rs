// tests/build.rs

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use bakedag::config::{Config, load_and_validate, load_materialized};
use bakedag::dag::{SNAPSHOT_FILE, Scheduler, Snapshot};
use bakedag::errors::{BakedagError, ExecutionError};
use bakedag::exec::{ExecutorBackend, LocalExecutor};
use bakedag::task::{Status, Task, TaskKind};
use bakedag::{build, clean, init, open_scheduler, render_listing};
use bakedag_test_utils::{FakeBackend, Sandbox, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// A, B -> C -> D. A and B copy their source, C concatenates both outputs,
/// D upper-cases C's output through a script.
const WORKFLOW: &str = r#"
[[task]]
name = "A"
kind = { type = "shell", cmd = "cat a.txt > a.out" }
inputs = ["A/a.txt"]
outputs = ["a.out"]

[[task]]
name = "B"
kind = { type = "shell", cmd = "cat b.txt > b.out" }
inputs = ["B/b.txt"]
outputs = ["b.out"]

[[task]]
name = "C"
kind = { type = "shell", cmd = "cat a.out b.out > c.out" }
inputs = ["a.out", "b.out"]
outputs = ["c.out"]
after = ["A", "B"]

[[task]]
name = "D"
kind = { type = "script", interpreter = "sh" }
inputs = ["D/d.sh", "c.out"]
outputs = ["d.out"]
after = ["C"]
"#;

/// Lay out a project and return the path of its config file.
fn project(sb: &Sandbox) -> PathBuf {
    sb.write("A/a.txt", "alpha\n");
    sb.write("B/b.txt", "beta\n");
    sb.write("D/d.sh", "tr a-z A-Z < c.out > d.out\n");
    sb.write("workflow.toml", WORKFLOW);
    sb.write(
        "Bakedag.toml",
        r#"
[system]
build_output_dir = "build"

[system.scheduler.queue]
type = "priority"
size = 2
"#,
    )
}

fn local(cfg: &Config) -> Arc<dyn ExecutorBackend> {
    Arc::new(LocalExecutor::from_config(cfg))
}

#[cfg(unix)]
#[tokio::test]
async fn end_to_end_build_is_incremental_across_invocations() -> TestResult {
    init_tracing();
    let sb = Sandbox::new();
    let data_dir = sb.data_dir();
    let cfg = load_and_validate(project(&sb))?;

    let initialized = init(cfg, &data_dir)?;
    assert_eq!(initialized.graph().len(), 4);
    assert!(data_dir.join(SNAPSHOT_FILE).is_file());

    // Later invocations only see the materialized settings.
    let cfg = load_materialized(&data_dir)?;

    let first = with_timeout(build(cfg.clone(), &data_dir, local(&cfg))).await?;
    assert!(first.is_success(), "{first}");
    assert_eq!(first.succeeded, vec!["A", "B", "C", "D"]);
    assert_eq!(sb.read("build/c.out"), "alpha\nbeta\n");
    assert_eq!(sb.read("build/d.out"), "ALPHA\nBETA\n");

    let restored = Scheduler::load(cfg.clone(), &data_dir)?;
    assert_eq!(restored.status_of("D"), Some(Status::Success));
    assert_eq!(restored.cache().len(), 4);

    let second = with_timeout(build(cfg.clone(), &data_dir, local(&cfg))).await?;
    assert_eq!(second.skipped, vec!["A", "B", "C", "D"]);

    sb.write("B/b.txt", "gamma\n");
    let third = with_timeout(build(cfg.clone(), &data_dir, local(&cfg))).await?;
    assert_eq!(third.succeeded, vec!["B", "C", "D"]);
    assert_eq!(third.skipped, vec!["A"]);
    assert_eq!(sb.read("build/d.out"), "ALPHA\nGAMMA\n");

    clean(&cfg)?;
    assert!(!sb.build_dir().exists());
    let fourth = with_timeout(build(cfg.clone(), &data_dir, local(&cfg))).await?;
    assert_eq!(fourth.succeeded.len(), 4);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn outputs_are_published_all_or_nothing() -> TestResult {
    init_tracing();
    let sb = Sandbox::new();
    let cfg = sb.config().build();
    let executor = LocalExecutor::from_config(&cfg);

    let partial = Task::new("partial", TaskKind::shell("echo one > one.txt"))
        .with_outputs(["one.txt", "two.txt"]);
    let mut status = Status::Queued;
    let err = executor
        .run_one(&partial, &mut status)
        .await
        .expect_err("second output is never produced");

    assert!(matches!(err, ExecutionError::MissingOutput { .. }));
    assert!(!sb.build_dir().join("one.txt").exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_fails_the_task_and_cancels_downstream() -> TestResult {
    let sb = Sandbox::new();
    let source = sb.write(
        "workflow.toml",
        r#"
[[task]]
name = "broken"
kind = { type = "shell", cmd = "exit 3" }

[[task]]
name = "after_broken"
kind = { type = "shell", cmd = "true" }
after = ["broken"]

[[task]]
name = "fine"
kind = { type = "shell", cmd = "echo ok > ok.txt" }
outputs = ["ok.txt"]
"#,
    );
    let cfg = sb.config().source(&source).build();

    let report = with_timeout(build(cfg.clone(), &sb.data_dir(), local(&cfg))).await?;

    assert_eq!(report.failed, vec!["broken"]);
    assert_eq!(report.cancelled, vec!["after_broken"]);
    assert_eq!(report.succeeded, vec!["fine"]);
    assert_eq!(sb.read("build/ok.txt"), "ok\n");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn reused_workdir_does_not_leak_old_outputs() -> TestResult {
    let sb = Sandbox::new();
    let cfg = sb.config().build();
    let executor = LocalExecutor::from_config(&cfg);

    let task = Task::new("maybe", TaskKind::shell("test -f flag && echo made > out.txt; true"))
        .with_outputs(["out.txt"]);
    let workdir = executor.workdir_for(&task);
    std::fs::create_dir_all(&workdir)?;
    std::fs::write(workdir.join("out.txt"), "left over")?;

    let mut status = Status::Queued;
    let err = executor.run_one(&task, &mut status).await.expect_err("no flag, no output");
    assert!(matches!(err, ExecutionError::MissingOutput { .. }));
    Ok(())
}

#[tokio::test]
async fn missing_input_is_a_setup_error() -> TestResult {
    let sb = Sandbox::new();
    let cfg = sb.config().build();
    let executor = LocalExecutor::from_config(&cfg);

    let task = Task::new("needs_input", TaskKind::shell("true"))
        .with_inputs([sb.path("src/absent.txt")]);
    let mut status = Status::Queued;
    let err = executor.run_one(&task, &mut status).await.expect_err("input is missing");

    assert!(err.is_setup());
    assert_eq!(status, Status::Queued);
    Ok(())
}

#[tokio::test]
async fn inputs_sharing_a_file_name_are_rejected() -> TestResult {
    let sb = Sandbox::new();
    let cfg = sb.config().build();
    let executor = LocalExecutor::from_config(&cfg);
    let first = sb.write("A/main.c", "int a;");
    let second = sb.write("B/main.c", "int b;");

    let task = Task::new("clash", TaskKind::shell("true")).with_inputs([first, second]);
    let mut status = Status::Queued;
    let err = executor.run_one(&task, &mut status).await.expect_err("names clash");

    assert!(matches!(err, ExecutionError::StagingClash { .. }));
    assert!(err.is_setup());
    assert!(!executor.workdir_for(&task).join("main.c").exists());
    Ok(())
}

#[tokio::test]
async fn snapshot_round_trip_preserves_ids_statuses_and_cache() -> TestResult {
    let sb = Sandbox::new();
    let source = sb.write(
        "workflow.toml",
        r#"
[[task]]
name = "gen"
kind = { type = "shell", cmd = "unused" }
outputs = ["gen.txt"]

[[task]]
name = "use"
kind = { type = "shell", cmd = "unused" }
inputs = ["gen.txt"]
outputs = ["use.txt"]
after = ["gen"]
"#,
    );
    let cfg = sb.config().source(&source).build();
    let data_dir = sb.data_dir();

    let backend = FakeBackend::new(sb.build_dir());
    with_timeout(build(cfg.clone(), &data_dir, Arc::new(backend.clone()))).await?;

    let snapshot = Snapshot::load(&data_dir)?.expect("snapshot written by build");
    let restored = Scheduler::from_snapshot(cfg.clone(), snapshot);
    let reopened = open_scheduler(cfg.clone(), &data_dir)?;

    for name in ["gen", "use"] {
        assert_eq!(restored.status_of(name), Some(Status::Success));
        assert_eq!(
            restored.graph().get_by_name(name).map(|t| t.id()),
            reopened.graph().get_by_name(name).map(|t| t.id())
        );
        let id = reopened.graph().get_by_name(name).map(|t| t.id()).unwrap();
        assert!(!reopened.is_ready(id));
    }

    let listing = render_listing(&reopened)?;
    assert!(listing.contains("gen"));
    assert!(listing.contains("up-to-date"));
    assert!(listing.contains("after: gen"));
    Ok(())
}

#[test]
fn corrupt_snapshot_is_fatal() -> TestResult {
    let sb = Sandbox::new();
    let cfg = sb.config().build();
    let data_dir = sb.data_dir();
    sb.write(".bakedag/snapshot.json", "{ not json");

    match Scheduler::load(cfg, &data_dir) {
        Err(BakedagError::SnapshotCorrupt { reason, .. }) => assert!(reason.contains("JSON")),
        other => panic!("expected SnapshotCorrupt, got {other:?}"),
    }
    Ok(())
}

#[test]
fn snapshot_from_another_version_is_rejected() -> TestResult {
    let sb = Sandbox::new();
    let source = sb.write(
        "workflow.toml",
        "[[task]]\nname = \"A\"\nkind = { type = \"shell\", cmd = \"true\" }\n",
    );
    let cfg = sb.config().source(&source).build();
    let data_dir = sb.data_dir();

    Scheduler::from_config(cfg.clone())?.save(&data_dir)?;

    let path = data_dir.join(SNAPSHOT_FILE);
    let mut json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    json["version"] = serde_json::json!(999);
    std::fs::write(&path, serde_json::to_string(&json)?)?;

    assert!(matches!(
        Scheduler::load(cfg, &data_dir),
        Err(BakedagError::SnapshotCorrupt { .. })
    ));
    Ok(())
}

#[test]
fn missing_snapshot_starts_fresh() -> TestResult {
    let sb = Sandbox::new();
    let source = sb.write(
        "workflow.toml",
        "[[task]]\nname = \"A\"\nkind = { type = \"shell\", cmd = \"true\" }\n",
    );
    let cfg = sb.config().source(&source).build();

    let s = Scheduler::load(cfg, &sb.data_dir())?;
    assert_eq!(s.status_of("A"), Some(Status::NotStarted));
    assert!(s.cache().is_empty());
    Ok(())
}
