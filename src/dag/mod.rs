// src/dag/mod.rs

//! Task graph and scheduling.
//!
//! - [`graph`] is the arena of tasks with cycle detection and traversals.
//! - [`traverse`] provides the lazy BFS / DFS iterators.
//! - [`scheduler`] decides readiness and drives a build to completion.
//! - [`snapshot`] persists graph, cache and statuses between invocations.
//! - [`report`] summarizes a finished build.

pub mod graph;
pub mod report;
pub mod scheduler;
pub mod snapshot;
pub mod traverse;

pub use graph::Graph;
pub use report::BuildReport;
pub use scheduler::Scheduler;
pub use snapshot::{SNAPSHOT_FILE, SNAPSHOT_VERSION, Snapshot};
pub use traverse::{Bfs, Dfs};
