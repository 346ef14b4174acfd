// src/dag/traverse.rs

//! Lazy graph traversals.
//!
//! Both iterators yield each reachable task exactly once, starting with the
//! frontier they were created from. They are used for diagnostics and for
//! finding the indirect effects of a failure; scheduling itself only looks
//! at direct edges.

use std::collections::{HashSet, VecDeque};

use crate::dag::Graph;
use crate::task::{Task, TaskId};

/// Breadth-first iterator over downstream edges.
pub struct Bfs<'g> {
    graph: &'g Graph,
    queue: VecDeque<TaskId>,
    seen: HashSet<TaskId>,
}

impl<'g> Bfs<'g> {
    pub(crate) fn new(graph: &'g Graph, frontier: Vec<TaskId>) -> Self {
        let mut seen = HashSet::new();
        let queue = frontier
            .into_iter()
            .filter(|id| graph.contains(*id) && seen.insert(*id))
            .collect();
        Self { graph, queue, seen }
    }
}

impl<'g> Iterator for Bfs<'g> {
    type Item = &'g Task;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        let task = self.graph.get(id)?;
        for down in task.downstream() {
            if self.seen.insert(*down) {
                self.queue.push_back(*down);
            }
        }
        Some(task)
    }
}

/// Depth-first, pre-order iterator over downstream edges.
pub struct Dfs<'g> {
    graph: &'g Graph,
    stack: Vec<TaskId>,
    seen: HashSet<TaskId>,
}

impl<'g> Dfs<'g> {
    pub(crate) fn new(graph: &'g Graph, frontier: Vec<TaskId>) -> Self {
        // Reverse so the first frontier task is visited first.
        let stack = frontier
            .into_iter()
            .rev()
            .filter(|id| graph.contains(*id))
            .collect();
        Self {
            graph,
            stack,
            seen: HashSet::new(),
        }
    }
}

impl<'g> Iterator for Dfs<'g> {
    type Item = &'g Task;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if !self.seen.insert(id) {
                continue;
            }
            let Some(task) = self.graph.get(id) else {
                continue;
            };
            for down in task.downstream().iter().rev() {
                if !self.seen.contains(down) {
                    self.stack.push(*down);
                }
            }
            return Some(task);
        }
        None
    }
}
