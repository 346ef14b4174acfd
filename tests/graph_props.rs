// tests/graph_props.rs

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;

use bakedag::dag::{Graph, Scheduler};
use bakedag::workflow::Workflow;
use bakedag_test_utils::{FakeBackend, Sandbox, bare_task};

/// Dependency lists of a random DAG: task i may only depend on tasks 0..i.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        }
                    })
                    .collect()
            },
        )
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn graph_of(deps: &[BTreeSet<usize>]) -> Graph {
    let mut wf = Workflow::new();
    for i in 0..deps.len() {
        wf.add(bare_task(&name(i)));
    }
    for (i, upstream) in deps.iter().enumerate() {
        for up in upstream {
            wf.precedes(name(*up), name(i));
        }
    }
    wf.into_graph().expect("generated graph is a DAG")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_graphs_are_acyclic_and_ordered(deps in dag_strategy(12)) {
        let graph = graph_of(&deps);
        prop_assert!(!graph.cycle_check());

        let order = graph.topological_order().expect("acyclic");
        prop_assert_eq!(order.len(), deps.len());

        let position: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, id)| (graph.name_of(*id), pos))
            .collect();
        for (i, upstream) in deps.iter().enumerate() {
            for up in upstream {
                prop_assert!(position[&name(*up)] < position[&name(i)]);
            }
        }
    }

    #[test]
    fn builds_never_run_a_task_past_a_failure(
        deps in dag_strategy(10),
        failing in proptest::collection::vec(0..10usize, 0..4),
    ) {
        let sb = Sandbox::new();
        let n = deps.len();
        let failing: HashSet<String> = failing.into_iter().filter(|i| *i < n).map(name).collect();

        let mut backend = FakeBackend::new(sb.build_dir());
        for f in &failing {
            backend = backend.failing(f);
        }

        let mut scheduler = Scheduler::new(sb.config().workers(3).build(), graph_of(&deps))
            .expect("valid graph");
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let report = rt.block_on(scheduler.build(Arc::new(backend.clone()))).expect("build");

        prop_assert_eq!(report.total(), n);
        let succeeded: HashSet<&String> = report.succeeded.iter().collect();
        for (i, upstream) in deps.iter().enumerate() {
            let this = name(i);
            let upstream_ok = upstream.iter().all(|up| succeeded.contains(&name(*up)));
            if !upstream_ok {
                prop_assert!(report.cancelled.contains(&this));
                prop_assert_eq!(backend.executed_count(&this), 0);
            } else if failing.contains(&this) {
                prop_assert!(report.failed.contains(&this));
            } else {
                prop_assert!(succeeded.contains(&this));
            }
        }
    }
}
