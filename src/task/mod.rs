// src/task/mod.rs

//! Task model: a single node of the build graph.
//!
//! - [`Task`] carries identity, declared inputs/outputs, priority, the
//!   `TaskKind` it executes, and its upstream/downstream handles.
//! - [`status`] holds the [`Status`] state machine.
//! - [`kind`] implements the concrete actions (shell, script, compile).

pub mod kind;
pub mod status;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{BakedagError, ExecutionError, Result};

pub use kind::TaskKind;
pub use status::Status;

/// Opaque, process-unique task handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Default priority for tasks that don't specify one.
pub const DEFAULT_PRIORITY: i32 = 1;

/// A node of the build graph.
///
/// Edges are stored on both ends as lists of [`TaskId`]s; declaring an edge
/// through [`Task::set_downstream`] or [`Task::set_upstream`] always updates
/// the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    name: String,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    priority: i32,
    kind: TaskKind,
    upstream: Vec<TaskId>,
    downstream: Vec<TaskId>,
}

impl Task {
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            priority: DEFAULT_PRIORITY,
            kind,
            upstream: Vec::new(),
            downstream: Vec::new(),
        }
    }

    pub fn with_inputs<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs = dedup_paths(inputs.into_iter().map(Into::into));
        self
    }

    pub fn with_outputs<I, P>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.outputs = dedup_paths(outputs.into_iter().map(Into::into));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Declared outputs, relative to the working / build-output directory.
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn upstream(&self) -> &[TaskId] {
        &self.upstream
    }

    pub fn downstream(&self) -> &[TaskId] {
        &self.downstream
    }

    /// Declare `self` as a prerequisite of `other` (self runs first).
    pub fn set_downstream(&mut self, other: &mut Task) -> Result<()> {
        if self.id == other.id {
            return Err(BakedagError::InvalidEdge(format!(
                "task '{}' cannot depend on itself",
                self.name
            )));
        }
        push_unique(&mut self.downstream, other.id);
        push_unique(&mut other.upstream, self.id);
        Ok(())
    }

    /// Declare `other` as a prerequisite of `self` (other runs first).
    pub fn set_upstream(&mut self, other: &mut Task) -> Result<()> {
        other.set_downstream(self)
    }

    /// Replace the id. Only meaningful before any edge was declared.
    pub(crate) fn set_id(&mut self, id: TaskId) {
        self.id = id;
    }

    /// Rewrite every input path through `resolve` (used when loading a
    /// workflow to turn relative inputs into absolute locations).
    pub(crate) fn resolve_inputs(&mut self, mut resolve: impl FnMut(&Path) -> PathBuf) {
        let resolved = self.inputs.iter().map(|p| resolve(p));
        self.inputs = dedup_paths(resolved);
    }

    /// Run the task inside `ctx`: pre-hook, kind-specific action, post-hook.
    ///
    /// `status` moves to `Running` on entry and to `Success` on normal
    /// completion. On error it is left at `Running`; the caller decides the
    /// final status.
    pub async fn run(&self, ctx: &ExecContext, status: &mut Status) -> std::result::Result<(), ExecutionError> {
        *status = Status::Running;
        self.pre_execute(ctx)?;
        self.kind.execute(self, ctx).await?;
        self.post_execute(ctx)?;
        *status = Status::Success;
        Ok(())
    }

    /// Make sure every input was materialized and output parents exist.
    fn pre_execute(&self, ctx: &ExecContext) -> std::result::Result<(), ExecutionError> {
        for input in &self.inputs {
            let staged = ctx.staged_input(input);
            if !staged.is_file() {
                return Err(ExecutionError::Setup {
                    task: self.name.clone(),
                    path: staged,
                });
            }
        }

        for output in &self.outputs {
            if let Some(parent) = ctx.workdir().join(output).parent() {
                std::fs::create_dir_all(parent).map_err(|source| ExecutionError::Io {
                    task: self.name.clone(),
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!(task = %self.name, workdir = ?ctx.workdir(), "pre-execute checks passed");
        Ok(())
    }

    /// Every declared output must have been produced in the working directory.
    fn post_execute(&self, ctx: &ExecContext) -> std::result::Result<(), ExecutionError> {
        for output in &self.outputs {
            let produced = ctx.workdir().join(output);
            if !produced.is_file() {
                return Err(ExecutionError::MissingOutput {
                    task: self.name.clone(),
                    path: output.clone(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Task: id={} name=({})>", self.id, self.name)
    }
}

/// Working context handed to a running task.
#[derive(Debug, Clone)]
pub struct ExecContext {
    workdir: PathBuf,
}

impl ExecContext {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Directory the task reads inputs from and writes outputs into.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Where an input is placed inside the working directory: flattened to
    /// its file name, so a task's inputs must have distinct file names.
    pub fn staged_input(&self, input: &Path) -> PathBuf {
        match input.file_name() {
            Some(name) => self.workdir.join(name),
            None => self.workdir.join(input),
        }
    }
}

fn push_unique(ids: &mut Vec<TaskId>, id: TaskId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// De-duplicate paths, keeping the first occurrence of each.
fn dedup_paths(paths: impl Iterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths.filter(|p| seen.insert(p.clone())).collect()
}
