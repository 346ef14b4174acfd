// src/errors.rs

//! Crate-wide error types.
//!
//! [`BakedagError`] covers everything that aborts a command (configuration,
//! graph construction, snapshot I/O). [`ExecutionError`] is local to a single
//! task run; the executor turns it into a `Failed` status instead of
//! propagating it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BakedagError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cycle detected in task graph: {0}")]
    CycleDetected(String),

    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Cache I/O error at {path:?}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot at {path:?} is corrupt: {reason}")]
    SnapshotCorrupt { path: PathBuf, reason: String },

    #[error("queue is closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single task run.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// A declared input was missing before the task could start.
    #[error("task '{task}': input {path:?} does not exist")]
    Setup { task: String, path: PathBuf },

    /// Two inputs would land on the same file in the working directory.
    #[error("task '{task}': inputs {first:?} and {second:?} share a file name")]
    StagingClash {
        task: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("task '{task}': failed to spawn `{program}`: {source}")]
    Spawn {
        task: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task '{task}': process exited with code {code}")]
    NonZeroExit { task: String, code: i32 },

    #[error("task '{task}': declared output {path:?} was not produced")]
    MissingOutput { task: String, path: PathBuf },

    #[error("task '{task}': {message}")]
    InvalidTask { task: String, message: String },

    #[error("task '{task}': I/O error on {path:?}: {source}")]
    Io {
        task: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutionError {
    /// Whether the failure happened while preparing the run rather than
    /// inside the task's own action.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ExecutionError::Setup { .. } | ExecutionError::StagingClash { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BakedagError>;
