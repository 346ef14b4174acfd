use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{LogLevel, QueueKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [system]
/// log_level = "info"
/// build_output_dir = "build"
///
/// [system.executor]
/// workspace = ".bakedag/workspace"
/// workers = 2
///
/// [system.scheduler]
/// retry = 1
///
/// [system.scheduler.queue]
/// size = 64
/// type = "priority"
///
/// [tasks]
/// workspace = "."
/// source = "workflow.toml"
/// ```
///
/// All sections are optional and have reasonable defaults. This is the raw
/// deserialized form; see [`Config`] for the validated version.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfig {
    #[serde(default)]
    pub system: SystemSection,

    #[serde(default)]
    pub tasks: TasksSection,
}

/// `[system]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemSection {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Shared directory that successful tasks publish their outputs into.
    #[serde(default = "default_build_output_dir")]
    pub build_output_dir: PathBuf,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            build_output_dir: default_build_output_dir(),
            executor: ExecutorSection::default(),
            scheduler: SchedulerSection::default(),
        }
    }
}

/// `[system.executor]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorSection {
    /// Base directory for per-task working directories.
    #[serde(default = "default_executor_workspace")]
    pub workspace: PathBuf,

    /// Number of worker tasks pulling from the request queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            workspace: default_executor_workspace(),
            workers: default_workers(),
        }
    }
}

/// `[system.scheduler]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SchedulerSection {
    #[serde(default)]
    pub queue: QueueSection,

    /// Extra attempts granted to a failing task before it is marked failed.
    #[serde(default)]
    pub retry: u32,
}

/// `[system.scheduler.queue]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSection {
    /// Capacity of both the request and the result queue.
    #[serde(default = "default_queue_size")]
    pub size: usize,

    /// `"fifo"` (default) or `"priority"`.
    #[serde(default, rename = "type")]
    pub kind: QueueKind,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            size: default_queue_size(),
            kind: QueueKind::default(),
        }
    }
}

/// `[tasks]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TasksSection {
    /// Base path that relative task inputs are resolved against.
    #[serde(default = "default_tasks_workspace")]
    pub workspace: PathBuf,

    /// Workflow file describing the tasks.
    #[serde(default = "default_tasks_source")]
    pub source: PathBuf,
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            workspace: default_tasks_workspace(),
            source: default_tasks_source(),
        }
    }
}

fn default_build_output_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_executor_workspace() -> PathBuf {
    PathBuf::from(".bakedag/workspace")
}

fn default_workers() -> usize {
    1
}

fn default_queue_size() -> usize {
    64
}

fn default_tasks_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_tasks_source() -> PathBuf {
    PathBuf::from("workflow.toml")
}

impl RawConfig {
    /// Make every configured path absolute, resolving relative ones against
    /// `base` (normally the directory holding the config file).
    pub fn resolve_paths(&mut self, base: &Path) {
        let absolutize = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        absolutize(&mut self.system.build_output_dir);
        absolutize(&mut self.system.executor.workspace);
        absolutize(&mut self.tasks.workspace);
        absolutize(&mut self.tasks.source);
    }
}

/// Validated configuration.
///
/// Constructed via `TryFrom<RawConfig>` (see `validate.rs`). Passed by
/// reference (or cloned) into every component at construction; nothing
/// mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub system: SystemSection,
    pub tasks: TasksSection,
}

impl Config {
    pub(crate) fn new_unchecked(system: SystemSection, tasks: TasksSection) -> Self {
        Self { system, tasks }
    }

    pub fn build_output_dir(&self) -> &Path {
        &self.system.build_output_dir
    }

    pub fn executor_workspace(&self) -> &Path {
        &self.system.executor.workspace
    }

    pub fn queue_size(&self) -> usize {
        self.system.scheduler.queue.size
    }

    pub fn queue_kind(&self) -> QueueKind {
        self.system.scheduler.queue.kind
    }

    pub fn retry_budget(&self) -> u32 {
        self.system.scheduler.retry
    }

    pub fn workers(&self) -> usize {
        self.system.executor.workers
    }

    pub fn log_level(&self) -> LogLevel {
        self.system.log_level
    }
}
