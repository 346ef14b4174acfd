// src/engine/mod.rs

//! Messages and channels shared by the scheduler and the executor.
//!
//! The scheduler and the executor only talk through two [`BoundedQueue`]s:
//! - the request queue carries [`Job`]s (tasks that are ready to run),
//! - the result queue carries [`TaskReport`]s (one per dequeued job).

pub mod queue;

use crate::task::{Status, Task, TaskId};

pub use queue::{BoundedQueue, Discipline, FifoDiscipline, PriorityDiscipline, QueueItem};

/// A ready task handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: TaskId,
    pub name: String,
    pub priority: i32,
    /// 1 for the first attempt, incremented on every retry.
    pub attempt: u32,
}

impl Job {
    pub fn for_task(task: &Task, attempt: u32) -> Self {
        Self {
            id: task.id(),
            name: task.name().to_string(),
            priority: task.priority(),
            attempt,
        }
    }
}

impl QueueItem for Job {
    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Final outcome of one dequeued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: TaskId,
    pub name: String,
    /// `Success`, `Skipped` or `Failed`.
    pub status: Status,
    pub attempt: u32,
    pub error: Option<String>,
}

impl TaskReport {
    pub fn new(job: &Job, status: Status) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            status,
            attempt: job.attempt,
            error: None,
        }
    }

    pub fn failed(job: &Job, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job, Status::Failed)
        }
    }
}

impl QueueItem for TaskReport {}

pub type RequestQueue = BoundedQueue<Job>;
pub type ResultQueue = BoundedQueue<TaskReport>;
