// src/workflow/loader.rs

//! TOML workflow files.
//!
//! ```toml
//! [[task]]
//! name = "A"
//! kind = { type = "compile", compiler = "g++" }
//! inputs = ["A/a.cpp"]
//! outputs = ["out"]
//!
//! [[task]]
//! name = "C"
//! kind = { type = "script", interpreter = "python3" }
//! inputs = ["C/c.py"]
//! after = ["A", "B"]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::dag::Graph;
use crate::errors::{BakedagError, Result};
use crate::task::{DEFAULT_PRIORITY, Task, TaskKind};
use crate::workflow::Workflow;

#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflow {
    #[serde(default)]
    pub task: Vec<RawTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub name: String,
    pub kind: TaskKind,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Tasks that must complete before this one.
    #[serde(default)]
    pub after: Vec<String>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// Parse workflow TOML into a [`Workflow`] (paths left as written).
pub fn parse_workflow(contents: &str) -> Result<Workflow> {
    let raw: RawWorkflow = toml::from_str(contents)?;
    if raw.task.is_empty() {
        return Err(BakedagError::Configuration(
            "workflow defines no tasks".to_string(),
        ));
    }

    let mut workflow = Workflow::new();
    for t in &raw.task {
        workflow.add(
            Task::new(t.name.clone(), t.kind.clone())
                .with_inputs(&t.inputs)
                .with_outputs(&t.outputs)
                .with_priority(t.priority),
        );
    }
    for t in raw.task {
        for before in t.after {
            workflow.precedes(before, t.name.clone());
        }
    }
    Ok(workflow)
}

/// Load `tasks.source` and build the task graph.
///
/// Relative inputs are resolved against `tasks.workspace`, or against the
/// build-output directory when a direct upstream task produces them. When
/// `previous` is given, tasks keep the ids they had there.
pub fn load_workflow(cfg: &Config, previous: Option<&Graph>) -> Result<Graph> {
    let source = &cfg.tasks.source;
    let contents = read_source(source)?;
    let mut workflow = parse_workflow(&contents)?;

    if let Some(previous) = previous {
        workflow.adopt_ids(previous);
    }
    workflow.resolve_inputs(&cfg.tasks.workspace, cfg.build_output_dir());

    let graph = workflow.into_graph().map_err(|e| match e {
        BakedagError::TaskNotFound(name) => BakedagError::Configuration(format!(
            "workflow {source:?} refers to unknown task '{name}' in `after`"
        )),
        other => other,
    })?;

    info!(source = ?source, tasks = graph.len(), "loaded workflow");
    Ok(graph)
}

fn read_source(source: &Path) -> Result<String> {
    fs::read_to_string(source).map_err(|e| {
        BakedagError::Configuration(format!("cannot read workflow source {source:?}: {e}"))
    })
}
