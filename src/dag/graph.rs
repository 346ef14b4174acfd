// src/dag/graph.rs

use std::collections::{HashMap, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dag::traverse::{Bfs, Dfs};
use crate::errors::{BakedagError, Result};
use crate::task::{Task, TaskId};

/// Per-node colour used by [`Graph::cycle_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Pending,
    Visited,
}

/// Arena of tasks keyed by [`TaskId`].
///
/// Edges live on the tasks themselves as adjacency lists of ids; degrees are
/// always recomputed from those lists. Insertion order is remembered so that
/// every traversal is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from tasks whose edges were declared beforehand, and
    /// validate it (dangling edges, cycles).
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let mut graph = Graph::new();
        for task in tasks {
            graph.add_task(task)?;
        }
        graph.validate()?;
        graph.ensure_acyclic()?;
        Ok(graph)
    }

    /// Insert a task. Ids and names must both be unique.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id()) {
            return Err(BakedagError::DuplicateTask(format!(
                "task ({}) already exists",
                task.name()
            )));
        }
        if self.get_by_name(task.name()).is_some() {
            return Err(BakedagError::DuplicateTask(format!(
                "another task is already named '{}'",
                task.name()
            )));
        }

        debug!(task = %task.name(), id = %task.id(), "added task to graph");
        self.order.push(task.id());
        self.tasks.insert(task.id(), task);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Task> {
        self.tasks.values().find(|t| t.name() == name)
    }

    /// Task name for logging; falls back to the id for unknown handles.
    pub fn name_of(&self, id: TaskId) -> String {
        self.get(id)
            .map(|t| t.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.order.iter().copied()
    }

    pub fn indegree(&self, id: TaskId) -> usize {
        self.get(id).map(|t| t.upstream().len()).unwrap_or(0)
    }

    pub fn outdegree(&self, id: TaskId) -> usize {
        self.get(id).map(|t| t.downstream().len()).unwrap_or(0)
    }

    pub fn upstream_of(&self, id: TaskId) -> &[TaskId] {
        self.get(id).map(|t| t.upstream()).unwrap_or(&[])
    }

    pub fn downstream_of(&self, id: TaskId) -> &[TaskId] {
        self.get(id).map(|t| t.downstream()).unwrap_or(&[])
    }

    /// Tasks with no upstream, in insertion order.
    pub fn roots(&self) -> Vec<TaskId> {
        self.ids().filter(|id| self.indegree(*id) == 0).collect()
    }

    /// Check that every edge points at a task of this graph and is recorded
    /// on both of its ends.
    pub fn validate(&self) -> Result<()> {
        for task in self.tasks() {
            for up in task.upstream() {
                let Some(other) = self.get(*up) else {
                    return Err(BakedagError::Configuration(format!(
                        "task '{}' depends on a task that is not part of the graph ({up})",
                        task.name()
                    )));
                };
                if !other.downstream().contains(&task.id()) {
                    return Err(BakedagError::Configuration(format!(
                        "edge '{}' -> '{}' is only recorded on one side",
                        other.name(),
                        task.name()
                    )));
                }
            }
            for down in task.downstream() {
                let Some(other) = self.get(*down) else {
                    return Err(BakedagError::Configuration(format!(
                        "task '{}' precedes a task that is not part of the graph ({down})",
                        task.name()
                    )));
                };
                if !other.upstream().contains(&task.id()) {
                    return Err(BakedagError::Configuration(format!(
                        "edge '{}' -> '{}' is only recorded on one side",
                        task.name(),
                        other.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if the graph contains a cycle.
    ///
    /// Iterative depth-first search from every zero-indegree node. Reaching a
    /// node that is still `Pending` (on the current path) is a back-edge.
    /// Nodes never reached from any root can only sit on or below a cycle, so
    /// they count as cyclic as well.
    pub fn cycle_check(&self) -> bool {
        let mut marks: HashMap<TaskId, Mark> =
            self.ids().map(|id| (id, Mark::Unvisited)).collect();

        for root in self.roots() {
            // Stack of (node, index of the next downstream edge to explore).
            let mut stack: Vec<(TaskId, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::Pending);

            while let Some((node, next)) = stack.last().copied() {
                let downstream = self.downstream_of(node);
                if next < downstream.len() {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let neighbor = downstream[next];
                    match marks.get(&neighbor).copied().unwrap_or(Mark::Unvisited) {
                        Mark::Unvisited => {
                            marks.insert(neighbor, Mark::Pending);
                            stack.push((neighbor, 0));
                        }
                        Mark::Pending => {
                            debug!(
                                from = %self.name_of(node),
                                to = %self.name_of(neighbor),
                                "back-edge found"
                            );
                            return true;
                        }
                        Mark::Visited => {}
                    }
                } else {
                    marks.insert(node, Mark::Visited);
                    stack.pop();
                }
            }
        }

        marks.values().any(|m| *m != Mark::Visited)
    }

    /// Fail with [`BakedagError::CycleDetected`] naming the tasks involved.
    pub fn ensure_acyclic(&self) -> Result<()> {
        if !self.cycle_check() {
            return Ok(());
        }

        let mut names: Vec<String> = self
            .cyclic_components()
            .into_iter()
            .flatten()
            .map(|id| self.name_of(id))
            .collect();
        names.sort();

        Err(BakedagError::CycleDetected(format!(
            "cycle detected in task graph involving tasks [{}]",
            names.join(", ")
        )))
    }

    /// Strongly connected components with more than one member.
    fn cyclic_components(&self) -> Vec<Vec<TaskId>> {
        let mut g: DiGraphMap<TaskId, ()> = DiGraphMap::new();
        for id in self.ids() {
            g.add_node(id);
        }
        for task in self.tasks() {
            for down in task.downstream() {
                g.add_edge(task.id(), *down, ());
            }
        }
        tarjan_scc(&g).into_iter().filter(|c| c.len() > 1).collect()
    }

    /// Topological order (Kahn). Among tasks that become available together,
    /// insertion order is kept.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut indegree: HashMap<TaskId, usize> =
            self.ids().map(|id| (id, self.indegree(id))).collect();
        let mut ready: VecDeque<TaskId> = self.roots().into();
        let mut order = Vec::with_capacity(self.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for down in self.downstream_of(id) {
                if let Some(d) = indegree.get_mut(down) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*down);
                    }
                }
            }
        }

        if order.len() != self.len() {
            self.ensure_acyclic()?;
            return Err(BakedagError::CycleDetected(
                "cycle detected in task graph".to_string(),
            ));
        }
        Ok(order)
    }

    /// Breadth-first traversal from `frontier` (all roots when empty).
    pub fn bfs(&self, frontier: &[TaskId]) -> Bfs<'_> {
        let start = if frontier.is_empty() {
            self.roots()
        } else {
            frontier.to_vec()
        };
        Bfs::new(self, start)
    }

    /// Depth-first (pre-order) traversal from `frontier` (all roots when empty).
    pub fn dfs(&self, frontier: &[TaskId]) -> Dfs<'_> {
        let start = if frontier.is_empty() {
            self.roots()
        } else {
            frontier.to_vec()
        };
        Dfs::new(self, start)
    }

    /// Every task reachable from `id` through downstream edges, excluding `id`.
    pub fn descendants(&self, id: TaskId) -> Vec<TaskId> {
        self.bfs(&[id])
            .map(|t| t.id())
            .filter(|other| *other != id)
            .collect()
    }
}
