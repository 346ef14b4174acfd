// src/exec/local.rs

//! Local executor backend: one plain working directory per task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::ExecutionError;
use crate::exec::backend::{ExecutorBackend, RunFuture};
use crate::task::{ExecContext, Status, Task};

/// Runs tasks directly on the host.
///
/// The working directory of a task is `<workspace>/<task name>`; it is
/// reused between runs, but declared outputs left over from a previous run
/// are removed before the task starts.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    workspace: PathBuf,
    build_output_dir: PathBuf,
}

impl LocalExecutor {
    pub fn new(workspace: impl Into<PathBuf>, build_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            build_output_dir: build_output_dir.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.executor_workspace(), cfg.build_output_dir())
    }

    pub fn workdir_for(&self, task: &Task) -> PathBuf {
        self.workspace.join(task.name())
    }

    async fn run_task(&self, task: &Task, status: &mut Status) -> Result<(), ExecutionError> {
        let workdir = self.workdir_for(task);
        let ctx = ExecContext::new(&workdir);

        fs::create_dir_all(&workdir)
            .await
            .map_err(|source| io_error(task, &workdir, source))?;

        self.stage_inputs(task, &ctx).await?;
        self.clear_stale_outputs(task, &ctx).await?;

        info!(task = %task.name(), workdir = ?workdir, "running task");
        task.run(&ctx, status).await?;

        self.publish_outputs(task, &ctx).await
    }

    /// Copy every input into the working directory.
    async fn stage_inputs(&self, task: &Task, ctx: &ExecContext) -> Result<(), ExecutionError> {
        // Check everything first so a missing input never leaves a half-staged
        // directory behind.
        let mut staged: HashMap<PathBuf, &PathBuf> = HashMap::new();
        for input in task.inputs() {
            if !fs::try_exists(input).await.unwrap_or(false) {
                return Err(ExecutionError::Setup {
                    task: task.name().to_string(),
                    path: input.clone(),
                });
            }
            if let Some(first) = staged.insert(ctx.staged_input(input), input) {
                if first != input {
                    return Err(ExecutionError::StagingClash {
                        task: task.name().to_string(),
                        first: first.clone(),
                        second: input.clone(),
                    });
                }
            }
        }

        for input in task.inputs() {
            let dst = ctx.staged_input(input);
            fs::copy(input, &dst)
                .await
                .map_err(|source| io_error(task, input, source))?;
            debug!(task = %task.name(), src = ?input, dst = ?dst, "staged input");
        }
        Ok(())
    }

    async fn clear_stale_outputs(&self, task: &Task, ctx: &ExecContext) -> Result<(), ExecutionError> {
        for output in task.outputs() {
            let path = ctx.workdir().join(output);
            if fs::try_exists(&path).await.unwrap_or(false) {
                fs::remove_file(&path)
                    .await
                    .map_err(|source| io_error(task, &path, source))?;
            }
        }
        Ok(())
    }

    /// Copy outputs into the build-output directory, all or nothing: every
    /// output must exist before the first one is copied.
    async fn publish_outputs(&self, task: &Task, ctx: &ExecContext) -> Result<(), ExecutionError> {
        let mut pending = Vec::with_capacity(task.outputs().len());
        for output in task.outputs() {
            let src = ctx.workdir().join(output);
            if !fs::try_exists(&src).await.unwrap_or(false) {
                return Err(ExecutionError::MissingOutput {
                    task: task.name().to_string(),
                    path: output.clone(),
                });
            }
            pending.push((src, self.build_output_dir.join(output)));
        }

        for (src, dst) in pending {
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| io_error(task, parent, source))?;
            }
            fs::copy(&src, &dst)
                .await
                .map_err(|source| io_error(task, &dst, source))?;
            debug!(task = %task.name(), dst = ?dst, "published output");
        }
        Ok(())
    }
}

impl ExecutorBackend for LocalExecutor {
    fn run_one<'a>(&'a self, task: &'a Task, status: &'a mut Status) -> RunFuture<'a> {
        Box::pin(self.run_task(task, status))
    }
}

fn io_error(task: &Task, path: &Path, source: std::io::Error) -> ExecutionError {
    ExecutionError::Io {
        task: task.name().to_string(),
        path: path.to_path_buf(),
        source,
    }
}
