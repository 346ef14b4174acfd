// tests/graph.rs

use std::error::Error;

use bakedag::dag::Graph;
use bakedag::errors::BakedagError;
use bakedag::task::Task;
use bakedag::workflow::Workflow;
use bakedag_test_utils::{bare_task, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

/// A -> B, A -> C, B -> D, C -> D
fn diamond() -> Result<Graph, BakedagError> {
    let mut wf = Workflow::new();
    for name in ["A", "B", "C", "D"] {
        wf.add(bare_task(name));
    }
    wf.precedes("A", "B")
        .precedes("A", "C")
        .precedes("B", "D")
        .precedes("C", "D");
    wf.into_graph()
}

fn names<'g>(tasks: impl Iterator<Item = &'g Task>) -> Vec<String> {
    tasks.map(|t| t.name().to_string()).collect()
}

#[test]
fn edges_are_recorded_on_both_ends() -> TestResult {
    let mut a = bare_task("A");
    let mut b = bare_task("B");
    a.set_downstream(&mut b)?;

    assert_eq!(a.downstream(), &[b.id()]);
    assert_eq!(b.upstream(), &[a.id()]);

    let mut c = bare_task("C");
    c.set_upstream(&mut b)?;
    assert_eq!(b.downstream(), &[c.id()]);
    assert_eq!(c.upstream(), &[b.id()]);
    Ok(())
}

#[test]
fn self_edge_is_rejected() {
    let mut a = bare_task("A");
    let mut same = a.clone();

    match a.set_downstream(&mut same) {
        Err(BakedagError::InvalidEdge(msg)) => assert!(msg.contains("A")),
        other => panic!("expected InvalidEdge, got {other:?}"),
    }

    let mut wf = Workflow::new();
    wf.add(bare_task("A")).precedes("A", "A");
    assert!(matches!(wf.into_graph(), Err(BakedagError::InvalidEdge(_))));
}

#[test]
fn duplicate_ids_and_names_are_rejected() -> TestResult {
    let a = bare_task("A");
    let mut graph = Graph::new();
    graph.add_task(a.clone())?;

    assert!(matches!(
        graph.add_task(a),
        Err(BakedagError::DuplicateTask(_))
    ));
    assert!(matches!(
        graph.add_task(bare_task("A")),
        Err(BakedagError::DuplicateTask(_))
    ));
    assert_eq!(graph.len(), 1);
    Ok(())
}

#[test]
fn degrees_and_roots() -> TestResult {
    init_tracing();
    let graph = diamond()?;
    let id = |n: &str| graph.get_by_name(n).map(|t| t.id()).unwrap();

    assert_eq!(graph.indegree(id("A")), 0);
    assert_eq!(graph.outdegree(id("A")), 2);
    assert_eq!(graph.indegree(id("D")), 2);
    assert_eq!(graph.outdegree(id("D")), 0);
    assert_eq!(graph.roots(), vec![id("A")]);
    Ok(())
}

#[test]
fn cycle_check_is_false_for_a_dag() -> TestResult {
    let graph = diamond()?;
    assert!(!graph.cycle_check());
    graph.ensure_acyclic()?;
    Ok(())
}

#[test]
fn back_edge_is_detected() -> TestResult {
    init_tracing();
    let mut a = bare_task("A");
    let mut b = bare_task("B");
    let mut c = bare_task("C");
    let mut root = bare_task("root");
    root.set_downstream(&mut a)?;
    a.set_downstream(&mut b)?;
    b.set_downstream(&mut c)?;
    c.set_downstream(&mut a)?;

    let mut graph = Graph::new();
    for t in [root, a, b, c] {
        graph.add_task(t)?;
    }

    assert!(graph.cycle_check());
    match graph.ensure_acyclic() {
        Err(BakedagError::CycleDetected(msg)) => {
            assert!(msg.contains("A") && msg.contains("B") && msg.contains("C"));
            assert!(!msg.contains("root"));
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
    Ok(())
}

#[test]
fn cycle_without_roots_is_detected() -> TestResult {
    let mut wf = Workflow::new();
    wf.add(bare_task("A")).add(bare_task("B"));
    wf.precedes("A", "B").precedes("B", "A");

    assert!(matches!(
        wf.into_graph(),
        Err(BakedagError::CycleDetected(_))
    ));
    Ok(())
}

#[test]
fn unknown_edge_target_fails_validation() -> TestResult {
    let mut a = bare_task("A");
    let mut ghost = bare_task("ghost");
    a.set_downstream(&mut ghost)?;

    let mut graph = Graph::new();
    graph.add_task(a)?;
    assert!(matches!(
        graph.validate(),
        Err(BakedagError::Configuration(_))
    ));
    Ok(())
}

#[test]
fn bfs_and_dfs_visit_each_task_once() -> TestResult {
    let graph = diamond()?;

    assert_eq!(names(graph.bfs(&[])), vec!["A", "B", "C", "D"]);
    assert_eq!(names(graph.dfs(&[])), vec!["A", "B", "D", "C"]);

    let c = graph.get_by_name("C").map(|t| t.id()).unwrap();
    assert_eq!(names(graph.bfs(&[c])), vec!["C", "D"]);
    Ok(())
}

#[test]
fn descendants_exclude_the_start_task() -> TestResult {
    let graph = diamond()?;
    let b = graph.get_by_name("B").map(|t| t.id()).unwrap();
    let d = graph.get_by_name("D").map(|t| t.id()).unwrap();

    assert_eq!(graph.descendants(b), vec![d]);
    assert!(graph.descendants(d).is_empty());
    Ok(())
}

#[test]
fn topological_order_respects_edges_and_insertion_order() -> TestResult {
    let graph = diamond()?;
    let order: Vec<String> = graph
        .topological_order()?
        .into_iter()
        .map(|id| graph.name_of(id))
        .collect();
    assert_eq!(order, vec!["A", "B", "C", "D"]);
    Ok(())
}

#[test]
fn unknown_task_in_precedes_is_reported() {
    let mut wf = Workflow::new();
    wf.add(bare_task("A")).precedes("A", "missing");
    match wf.into_graph() {
        Err(BakedagError::TaskNotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected TaskNotFound, got {other:?}"),
    }
}
