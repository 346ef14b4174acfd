// src/exec/executor_loop.rs

//! Worker loop that drains the request queue.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::Cache;
use crate::dag::Graph;
use crate::engine::{Job, RequestQueue, ResultQueue, TaskReport};
use crate::exec::backend::ExecutorBackend;
use crate::task::Status;

/// Pulls ready jobs from the request queue and pushes one [`TaskReport`] per
/// job to the result queue.
///
/// `workers` worker tasks share the request queue; each one exits when the
/// queue reports closed and drained.
#[derive(Clone)]
pub struct Executor {
    backend: Arc<dyn ExecutorBackend>,
    graph: Arc<Graph>,
    cache: Arc<Mutex<Cache>>,
    requests: Arc<RequestQueue>,
    results: Arc<ResultQueue>,
    workers: usize,
}

impl Executor {
    pub fn new(
        backend: Arc<dyn ExecutorBackend>,
        graph: Arc<Graph>,
        cache: Arc<Mutex<Cache>>,
        requests: Arc<RequestQueue>,
        results: Arc<ResultQueue>,
    ) -> Self {
        Self {
            backend,
            graph,
            cache,
            requests,
            results,
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all workers until the request queue is closed and drained.
    pub async fn run(self) {
        info!(workers = self.workers, "executor started");

        let mut set = JoinSet::new();
        for worker in 0..self.workers {
            let this = self.clone();
            set.spawn(async move { this.worker_loop(worker).await });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "executor worker panicked");
            }
        }

        info!("executor finished (request queue closed)");
    }

    async fn worker_loop(&self, worker: usize) {
        debug!(worker, "worker started");
        while let Some(job) = self.requests.pop().await {
            let report = self.handle(job).await;
            if self.results.put(report).await.is_err() {
                warn!(worker, "result queue closed; dropping report and stopping worker");
                break;
            }
        }
        debug!(worker, "worker finished");
    }

    /// Decide between skip and run for one job; never fails.
    pub async fn handle(&self, job: Job) -> TaskReport {
        let Some(task) = self.graph.get(job.id) else {
            warn!(task = %job.name, "job refers to a task missing from the graph");
            return TaskReport::failed(&job, format!("unknown task '{}'", job.name));
        };

        {
            let mut cache = self.cache.lock().await;
            if !cache.is_stale(task, &self.graph) {
                info!(task = %task.name(), "up to date; skipping");
                cache.record(task, &self.graph);
                return TaskReport::new(&job, Status::Skipped);
            }
        }

        info!(task = %task.name(), attempt = job.attempt, "executing task");
        let mut status = Status::Queued;
        match self.backend.run_one(task, &mut status).await {
            Ok(()) => {
                self.cache.lock().await.record(task, &self.graph);
                info!(task = %task.name(), status = %status, "task completed");
                TaskReport::new(&job, Status::Success)
            }
            Err(e) => {
                if e.is_setup() {
                    warn!(task = %task.name(), error = %e, "task setup failed");
                } else {
                    warn!(task = %task.name(), error = %e, "task failed");
                }
                TaskReport::failed(&job, e)
            }
        }
    }
}
