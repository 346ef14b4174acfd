use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bakedag::errors::ExecutionError;
use bakedag::exec::{ExecutorBackend, RunFuture};
use bakedag::task::{Status, Task};

/// A fake backend that:
/// - records which tasks were "run", in order
/// - fails with a setup error when an input is missing, like a real backend
/// - fails named tasks a configurable number of times
/// - otherwise writes every declared output into the build-output
///   directory; the content depends only on the task name and its inputs,
///   so re-running a task with unchanged inputs reproduces its outputs.
#[derive(Clone)]
pub struct FakeBackend {
    build_output_dir: PathBuf,
    executed: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<String, usize>>>,
    delay: Option<Duration>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new(build_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_output_dir: build_output_dir.into(),
            executed: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            delay: None,
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make `name` fail on every run.
    pub fn failing(self, name: &str) -> Self {
        self.failing_times(name, usize::MAX)
    }

    /// Make `name` fail on its first `times` runs.
    pub fn failing_times(self, name: &str, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), times);
        self
    }

    /// Sleep this long inside every run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Names of the tasks run so far, in start order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_count(&self, name: &str) -> usize {
        self.executed().iter().filter(|n| n.as_str() == name).count()
    }

    /// Highest number of tasks observed running at the same time.
    pub fn max_parallel(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn run_task(&self, task: &Task, status: &mut Status) -> Result<(), ExecutionError> {
        for input in task.inputs() {
            if !input.is_file() {
                return Err(ExecutionError::Setup {
                    task: task.name().to_string(),
                    path: input.clone(),
                });
            }
        }

        *status = Status::Running;
        self.executed.lock().unwrap().push(task.name().to_string());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.should_fail(task.name()) {
            return Err(ExecutionError::NonZeroExit {
                task: task.name().to_string(),
                code: 1,
            });
        }

        let mut content = format!("{}\n", task.name());
        for input in task.inputs() {
            content.push_str(&fs::read_to_string(input).unwrap_or_default());
        }
        for output in task.outputs() {
            let path = self.build_output_dir.join(output);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, &content).unwrap();
        }

        *status = Status::Success;
        Ok(())
    }

    fn should_fail(&self, name: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(name) {
            Some(0) | None => false,
            Some(left) => {
                *left = left.saturating_sub(1);
                true
            }
        }
    }
}

impl ExecutorBackend for FakeBackend {
    fn run_one<'a>(&'a self, task: &'a Task, status: &'a mut Status) -> RunFuture<'a> {
        Box::pin(self.run_task(task, status))
    }
}
