// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The executor loop talks to an `ExecutorBackend` instead of running
//! processes itself. The backend decides how a task's working directory is
//! materialized and how its action is launched:
//!
//! - [`LocalExecutor`](super::LocalExecutor) uses a plain directory per task
//!   under `system.executor.workspace`.
//! - An isolated-root or container backend would implement the same trait.
//! - Tests provide fakes that write outputs directly or fail on demand.
//!
//! Every backend honours the same contract: inputs are copied in before the
//! task starts, a missing input is a setup error, and outputs are published
//! to the build-output directory only after the task succeeded.

use std::future::Future;
use std::pin::Pin;

use crate::errors::ExecutionError;
use crate::task::{Status, Task};

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>>;

/// Trait abstracting how a single task is executed.
pub trait ExecutorBackend: Send + Sync {
    /// Run `task` and publish its outputs.
    ///
    /// `status` follows the task state machine (`Running` while the action
    /// runs, `Success` once it completed). On error the executor loop marks
    /// the task `Failed`.
    fn run_one<'a>(&'a self, task: &'a Task, status: &'a mut Status) -> RunFuture<'a>;
}
