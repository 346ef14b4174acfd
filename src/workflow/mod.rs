// src/workflow/mod.rs

//! Workflow definition: the set of tasks and the edges between them.
//!
//! - [`Workflow`] is the programmatic builder (`precedes("A", "C")`).
//! - [`loader`] reads the same information from a TOML file of `[[task]]`
//!   entries.
//!
//! Edges are declared by task name and only resolved into [`TaskId`] pairs by
//! [`Workflow::into_graph`], so ids can still be swapped (see
//! [`Workflow::adopt_ids`]) before the graph is built.

pub mod loader;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dag::Graph;
use crate::errors::{BakedagError, Result};
use crate::task::Task;

pub use loader::{RawTask, RawWorkflow, load_workflow, parse_workflow};

/// Tasks plus name-level edges, not yet validated.
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    tasks: Vec<Task>,
    edges: Vec<(String, String)>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Task) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// Builder form of [`Workflow::add`].
    pub fn with_task(mut self, task: Task) -> Self {
        self.add(task);
        self
    }

    /// Declare that `before` must complete before `after` starts.
    pub fn precedes(&mut self, before: impl Into<String>, after: impl Into<String>) -> &mut Self {
        self.edges.push((before.into(), after.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Reuse the ids of same-named tasks from a previously built graph, so
    /// cache records and statuses keyed by those ids keep applying.
    pub fn adopt_ids(&mut self, previous: &Graph) {
        for task in &mut self.tasks {
            if let Some(old) = previous.get_by_name(task.name()) {
                task.set_id(old.id());
            }
        }
    }

    /// Turn relative inputs into absolute paths.
    ///
    /// An input that a direct upstream task declares as one of its outputs
    /// lives in `build_output_dir`; anything else is looked up in
    /// `workspace`.
    pub fn resolve_inputs(&mut self, workspace: &Path, build_output_dir: &Path) {
        let produced: HashMap<String, Vec<PathBuf>> = self
            .tasks
            .iter()
            .map(|t| (t.name().to_string(), t.outputs().to_vec()))
            .collect();

        for task in &mut self.tasks {
            let upstream_outputs: Vec<&PathBuf> = self
                .edges
                .iter()
                .filter(|(_, after)| after == task.name())
                .filter_map(|(before, _)| produced.get(before))
                .flatten()
                .collect();

            task.resolve_inputs(|input| {
                if input.is_absolute() {
                    input.to_path_buf()
                } else if upstream_outputs.iter().any(|o| o.as_path() == input) {
                    build_output_dir.join(input)
                } else {
                    workspace.join(input)
                }
            });
        }
    }

    /// Resolve the edges and build a validated, acyclic [`Graph`].
    pub fn into_graph(self) -> Result<Graph> {
        let Workflow { mut tasks, edges } = self;

        let index: HashMap<String, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();

        for (before, after) in &edges {
            let lookup = |name: &str| {
                index
                    .get(name)
                    .copied()
                    .ok_or_else(|| BakedagError::TaskNotFound(name.to_string()))
            };
            let b = lookup(before)?;
            let a = lookup(after)?;

            if a == b {
                return Err(BakedagError::InvalidEdge(format!(
                    "task '{before}' cannot depend on itself"
                )));
            }

            let (first, second) = pair_mut(&mut tasks, b, a);
            first.set_downstream(second)?;
            debug!(before = %before, after = %after, "declared edge");
        }

        Graph::from_tasks(tasks)
    }
}

/// Two distinct mutable elements of a slice, in the order requested.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}
