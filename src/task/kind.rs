// src/task/kind.rs

//! Concrete task kinds.
//!
//! Every kind maps a task's inputs and outputs to one subprocess invocation
//! run inside the task's working directory. Inputs have already been copied
//! into that directory by the executor, so they are addressed by file name.

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::ExecutionError;
use crate::task::{ExecContext, Task};

/// What a task actually does when it runs.
///
/// In a workflow file this is written as an inline table, e.g.
/// `kind = { type = "shell", cmd = "make all" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskKind {
    /// Run a command line through the platform shell.
    Shell { cmd: String },
    /// Run the first input file with an interpreter (`python3`, `bash`, ...).
    Script { interpreter: String },
    /// Compile the first input into the first output.
    Compile {
        compiler: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl TaskKind {
    pub fn shell(cmd: impl Into<String>) -> Self {
        TaskKind::Shell { cmd: cmd.into() }
    }

    pub fn script(interpreter: impl Into<String>) -> Self {
        TaskKind::Script {
            interpreter: interpreter.into(),
        }
    }

    pub fn compile(compiler: impl Into<String>) -> Self {
        TaskKind::Compile {
            compiler: compiler.into(),
            args: Vec::new(),
        }
    }

    /// Short label used in listings.
    pub fn label(&self) -> String {
        match self {
            TaskKind::Shell { cmd } => format!("shell: {cmd}"),
            TaskKind::Script { interpreter } => format!("script: {interpreter}"),
            TaskKind::Compile { compiler, .. } => format!("compile: {compiler}"),
        }
    }

    /// Run the kind-specific action for `task` inside `ctx.workdir()`.
    pub async fn execute(&self, task: &Task, ctx: &ExecContext) -> Result<(), ExecutionError> {
        let mut cmd = self.command(task)?;
        run_command(task.name(), &mut cmd, ctx.workdir()).await
    }

    fn command(&self, task: &Task) -> Result<Command, ExecutionError> {
        match self {
            TaskKind::Shell { cmd } => {
                // Build a shell command appropriate for the platform.
                let command = if cfg!(windows) {
                    let mut c = Command::new("cmd");
                    c.arg("/C").arg(cmd);
                    c
                } else {
                    let mut c = Command::new("sh");
                    c.arg("-c").arg(cmd);
                    c
                };
                Ok(command)
            }
            TaskKind::Script { interpreter } => {
                let script = first_input_name(task)?;
                let mut c = Command::new(interpreter);
                c.arg(script);
                Ok(c)
            }
            TaskKind::Compile { compiler, args } => {
                let source = first_input_name(task)?;
                let output = task.outputs().first().ok_or_else(|| ExecutionError::InvalidTask {
                    task: task.name().to_string(),
                    message: "compile tasks need at least one declared output".to_string(),
                })?;
                let mut c = Command::new(compiler);
                c.arg(source).arg("-o").arg(output).args(args);
                Ok(c)
            }
        }
    }
}

fn first_input_name(task: &Task) -> Result<std::ffi::OsString, ExecutionError> {
    task.inputs()
        .first()
        .and_then(|p| p.file_name())
        .map(|n| n.to_os_string())
        .ok_or_else(|| ExecutionError::InvalidTask {
            task: task.name().to_string(),
            message: "this task kind needs at least one declared input".to_string(),
        })
}

/// Spawn `cmd` in `workdir`, forward its output to the log and map a
/// non-zero exit to [`ExecutionError::NonZeroExit`].
async fn run_command(task: &str, cmd: &mut Command, workdir: &Path) -> Result<(), ExecutionError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
        task: task.to_string(),
        program: program.clone(),
        source,
    })?;

    // Always consume stdout/stderr so pipe buffers don't fill.
    let mut forwarders = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let name = task.to_string();
        forwarders.push(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(task = %name, "stdout: {}", line);
            }
        }));
    }
    if let Some(stderr) = child.stderr.take() {
        let name = task.to_string();
        forwarders.push(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %name, "stderr: {}", line);
            }
        }));
    }

    let status = child.wait().await.map_err(|source| ExecutionError::Io {
        task: task.to_string(),
        path: workdir.to_path_buf(),
        source,
    })?;

    for forwarder in forwarders {
        let _ = forwarder.await;
    }

    let code = status.code().unwrap_or(-1);
    info!(
        task = %task,
        program = %program,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if status.success() {
        Ok(())
    } else {
        Err(ExecutionError::NonZeroExit {
            task: task.to_string(),
            code,
        })
    }
}
