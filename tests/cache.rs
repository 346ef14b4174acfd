// tests/cache.rs

use std::error::Error;
use std::fs;

use bakedag::cache::{Cache, StaleReason, compute_file_hash, fingerprint};
use bakedag::workflow::Workflow;
use bakedag_test_utils::{Sandbox, init_tracing, task};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn fingerprint_tracks_content_not_path() -> TestResult {
    let sb = Sandbox::new();
    let one = sb.write("one.txt", "same bytes");
    let two = sb.write("two.txt", "same bytes");
    let other = sb.write("other.txt", "different bytes");

    assert_eq!(compute_file_hash(&one)?, compute_file_hash(&two)?);
    assert_ne!(compute_file_hash(&one)?, compute_file_hash(&other)?);
    assert_eq!(compute_file_hash(&one)?.as_str().len(), 64);
    assert!(fingerprint(&sb.path("missing.txt")).is_none());
    Ok(())
}

#[test]
fn task_without_record_is_stale_until_recorded() -> TestResult {
    init_tracing();
    let sb = Sandbox::new();
    let input = sb.write("src/a.c", "int main() {}");
    sb.write("build/a.out", "binary");

    let graph = Workflow::new()
        .with_task(task("A", &[input.as_path()], &["a.out"]))
        .into_graph()?;
    let a = graph.get_by_name("A").unwrap();

    let mut cache = Cache::new(sb.build_dir());
    assert_eq!(cache.staleness(a, &graph), Some(StaleReason::NoRecord));
    assert!(cache.is_stale(a, &graph));

    cache.record(a, &graph);
    assert!(!cache.is_stale(a, &graph));
    assert_eq!(cache.len(), 1);
    Ok(())
}

#[test]
fn input_change_or_output_deletion_makes_task_stale() -> TestResult {
    let sb = Sandbox::new();
    let input = sb.write("src/a.c", "v1");
    sb.write("build/a.out", "binary");

    let graph = Workflow::new()
        .with_task(task("A", &[input.as_path()], &["a.out"]))
        .into_graph()?;
    let a = graph.get_by_name("A").unwrap();

    let mut cache = Cache::new(sb.build_dir());
    cache.record(a, &graph);

    fs::write(&input, "v2")?;
    assert_eq!(
        cache.staleness(a, &graph),
        Some(StaleReason::InputChanged(input.clone()))
    );

    cache.record(a, &graph);
    assert!(!cache.is_stale(a, &graph));

    fs::remove_file(sb.path("build/a.out"))?;
    assert!(matches!(
        cache.staleness(a, &graph),
        Some(StaleReason::OutputChanged(_))
    ));
    Ok(())
}

#[test]
fn changed_declarations_make_task_stale() -> TestResult {
    let sb = Sandbox::new();
    let input = sb.write("src/a.c", "v1");
    let extra = sb.write("src/extra.h", "#pragma once");
    sb.write("build/a.out", "binary");

    let graph = Workflow::new()
        .with_task(task("A", &[input.as_path()], &["a.out"]))
        .into_graph()?;
    let a = graph.get_by_name("A").unwrap();

    let mut cache = Cache::new(sb.build_dir());
    cache.record(a, &graph);

    let more_inputs = a.clone().with_inputs([input.clone(), extra]);
    assert_eq!(
        cache.staleness(&more_inputs, &graph),
        Some(StaleReason::InputSetChanged)
    );

    let other_outputs = a.clone().with_outputs(["a.out", "a.map"]);
    assert_eq!(
        cache.staleness(&other_outputs, &graph),
        Some(StaleReason::OutputSetChanged)
    );
    Ok(())
}

#[test]
fn upstream_output_change_makes_downstream_stale() -> TestResult {
    init_tracing();
    let sb = Sandbox::new();
    let src = sb.write("src/gen.sh", "echo gen");
    sb.write("build/gen.txt", "generated v1");
    sb.write("build/final.txt", "final");

    let mut wf = Workflow::new();
    wf.add(task("gen", &[src.as_path()], &["gen.txt"]))
        .add(task("final", &[sb.path("build/gen.txt").as_path()], &["final.txt"]))
        .precedes("gen", "final");
    let graph = wf.into_graph()?;
    let producer = graph.get_by_name("gen").unwrap();
    let consumer = graph.get_by_name("final").unwrap();

    let mut cache = Cache::new(sb.build_dir());
    cache.record(producer, &graph);
    cache.record(consumer, &graph);
    assert!(!cache.is_stale(consumer, &graph));

    // Rewrite the upstream output and re-record the producer: the consumer's
    // own input changed and so did the upstream outputs it saw.
    fs::write(sb.path("build/gen.txt"), "generated v2")?;
    cache.record(producer, &graph);
    assert!(!cache.is_stale(producer, &graph));
    assert!(cache.is_stale(consumer, &graph));
    Ok(())
}

#[test]
fn upstream_outputs_are_checked_even_when_not_consumed() -> TestResult {
    let sb = Sandbox::new();
    sb.write("build/log.txt", "v1");

    let mut wf = Workflow::new();
    wf.add(task("up", &[], &["log.txt"]))
        .add(task("down", &[], &[]))
        .precedes("up", "down");
    let graph = wf.into_graph()?;
    let up = graph.get_by_name("up").unwrap();
    let down = graph.get_by_name("down").unwrap();

    let mut cache = Cache::new(sb.build_dir());
    cache.record(up, &graph);
    cache.record(down, &graph);
    assert!(!cache.is_stale(down, &graph));

    fs::write(sb.path("build/log.txt"), "v2")?;
    assert_eq!(
        cache.staleness(down, &graph),
        Some(StaleReason::UpstreamChanged("up".to_string()))
    );
    Ok(())
}

#[test]
fn missing_input_at_record_time_stays_stale() -> TestResult {
    let sb = Sandbox::new();
    let missing = sb.path("src/not-there.c");

    let graph = Workflow::new()
        .with_task(task("A", &[missing.as_path()], &[]))
        .into_graph()?;
    let a = graph.get_by_name("A").unwrap();

    let mut cache = Cache::new(sb.build_dir());
    cache.record(a, &graph);
    assert_eq!(cache.staleness(a, &graph), Some(StaleReason::InputSetChanged));
    Ok(())
}

#[test]
fn forget_and_prune_drop_records() -> TestResult {
    let sb = Sandbox::new();
    let graph = Workflow::new()
        .with_task(task("A", &[], &[]))
        .with_task(task("B", &[], &[]))
        .into_graph()?;
    let a = graph.get_by_name("A").unwrap();
    let b = graph.get_by_name("B").unwrap();

    let mut cache = Cache::new(sb.build_dir());
    cache.record(a, &graph);
    cache.record(b, &graph);

    assert!(cache.forget(a.id()).is_some());
    assert!(cache.is_stale(a, &graph));
    assert!(!cache.is_stale(b, &graph));

    let smaller = Workflow::new()
        .with_task(task("C", &[], &[]))
        .into_graph()?;
    assert_eq!(cache.prune(&smaller), 1);
    assert!(cache.is_empty());
    Ok(())
}
