// src/cache/mod.rs

//! Content-addressed incremental-build cache.
//!
//! - [`fingerprint`] hashes files (BLAKE3, streamed).
//! - [`record`] holds [`CachedRecord`], the per-task snapshot.
//!
//! [`Cache::is_stale`] compares a task's live inputs, outputs and direct
//! upstream outputs against the record taken at its last successful build.
//! Because each record also keeps a copy of what the upstream outputs looked
//! like, staleness propagates one edge at a time without walking the graph.

pub mod fingerprint;
pub mod record;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dag::Graph;
use crate::task::{Task, TaskId};

pub use fingerprint::{Fingerprint, FingerprintMap, compute_file_hash, fingerprint};
pub use record::CachedRecord;

use fingerprint::fingerprint_all;

/// Why a task needs to be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    NoRecord,
    InputSetChanged,
    InputChanged(PathBuf),
    OutputSetChanged,
    OutputChanged(PathBuf),
    UpstreamSetChanged,
    UpstreamChanged(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoRecord => write!(f, "never built"),
            StaleReason::InputSetChanged => write!(f, "declared inputs changed"),
            StaleReason::InputChanged(p) => write!(f, "input {} changed", p.display()),
            StaleReason::OutputSetChanged => write!(f, "declared outputs changed"),
            StaleReason::OutputChanged(p) => {
                write!(f, "output {} missing or changed", p.display())
            }
            StaleReason::UpstreamSetChanged => write!(f, "upstream tasks changed"),
            StaleReason::UpstreamChanged(name) => write!(f, "outputs of '{name}' changed"),
        }
    }
}

/// Task id → [`CachedRecord`], plus the build-output directory that output
/// paths are resolved against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cache {
    build_output_dir: PathBuf,
    records: HashMap<TaskId, CachedRecord>,
}

impl Cache {
    pub fn new(build_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_output_dir: build_output_dir.into(),
            records: HashMap::new(),
        }
    }

    pub fn build_output_dir(&self) -> &Path {
        &self.build_output_dir
    }

    /// Absolute location of a declared output.
    pub fn output_path(&self, output: &Path) -> PathBuf {
        self.build_output_dir.join(output)
    }

    pub fn get(&self, id: TaskId) -> Option<&CachedRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take a fresh record for a task that just completed successfully,
    /// replacing any previous one.
    pub fn record(&mut self, task: &Task, graph: &Graph) {
        let inputs = fingerprint_all(task.inputs(), Path::to_path_buf);
        let outputs = fingerprint_all(task.outputs(), |p| self.output_path(p));

        let upstream = task
            .upstream()
            .iter()
            .map(|up| {
                let recorded = self
                    .records
                    .get(up)
                    .map(|r| r.outputs.clone())
                    .unwrap_or_default();
                (*up, recorded)
            })
            .collect();

        let record = CachedRecord {
            task_id: task.id(),
            inputs,
            outputs,
            upstream,
        };

        info!(
            task = %task.name(),
            inputs = record.inputs.len(),
            outputs = record.outputs.len(),
            upstream = graph.indegree(task.id()),
            "recorded task in cache"
        );
        self.records.insert(task.id(), record);
    }

    /// Whether `task` must be rebuilt.
    pub fn is_stale(&self, task: &Task, graph: &Graph) -> bool {
        match self.staleness(task, graph) {
            Some(reason) => {
                debug!(task = %task.name(), %reason, "task is stale");
                true
            }
            None => false,
        }
    }

    /// First reason found for rebuilding `task`, or `None` if its record is
    /// still valid.
    pub fn staleness(&self, task: &Task, graph: &Graph) -> Option<StaleReason> {
        let Some(record) = self.records.get(&task.id()) else {
            return Some(StaleReason::NoRecord);
        };

        // (b) inputs
        if !same_keys(&record.inputs, task.inputs()) {
            return Some(StaleReason::InputSetChanged);
        }
        for input in task.inputs() {
            if fingerprint(input).as_ref() != record.inputs.get(input) {
                return Some(StaleReason::InputChanged(input.clone()));
            }
        }

        // (c) outputs, as published in the build-output directory
        if !same_keys(&record.outputs, task.outputs()) {
            return Some(StaleReason::OutputSetChanged);
        }
        for output in task.outputs() {
            if fingerprint(&self.output_path(output)).as_ref() != record.outputs.get(output) {
                return Some(StaleReason::OutputChanged(output.clone()));
            }
        }

        // (d) upstream set
        let recorded_up: BTreeSet<TaskId> = record.upstream.keys().copied().collect();
        let current_up: BTreeSet<TaskId> = task.upstream().iter().copied().collect();
        if recorded_up != current_up {
            return Some(StaleReason::UpstreamSetChanged);
        }

        // (e) live upstream outputs vs. what they were when we last built
        for up in task.upstream() {
            let Some(up_task) = graph.get(*up) else {
                return Some(StaleReason::UpstreamSetChanged);
            };
            let live = fingerprint_all(up_task.outputs(), |p| self.output_path(p));
            if record.upstream.get(up) != Some(&live) {
                return Some(StaleReason::UpstreamChanged(up_task.name().to_string()));
            }
        }

        None
    }

    /// Drop the record of a task so its next check reports stale.
    pub fn forget(&mut self, id: TaskId) -> Option<CachedRecord> {
        self.records.remove(&id)
    }

    /// Drop records of tasks that are no longer part of `graph`.
    pub fn prune(&mut self, graph: &Graph) -> usize {
        let before = self.records.len();
        self.records.retain(|id, _| graph.contains(*id));
        let removed = before - self.records.len();
        if removed > 0 {
            info!(removed, "pruned cache records of unknown tasks");
        }
        removed
    }
}

fn same_keys(recorded: &FingerprintMap, declared: &[PathBuf]) -> bool {
    let declared: BTreeSet<&PathBuf> = declared.iter().collect();
    let recorded: BTreeSet<&PathBuf> = recorded.keys().collect();
    declared == recorded
}
