// src/dag/scheduler.rs

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::Config;
use crate::dag::graph::Graph;
use crate::dag::report::BuildReport;
use crate::dag::snapshot::Snapshot;
use crate::engine::{Job, RequestQueue, ResultQueue, TaskReport};
use crate::errors::{BakedagError, Result};
use crate::exec::{Executor, ExecutorBackend};
use crate::task::{Status, TaskId};
use crate::workflow::load_workflow;

/// Scheduler holds the task graph, the cache and per-task statuses.
///
/// It is responsible for:
/// - deciding which tasks are ready (upstream done, cache says stale)
/// - feeding ready tasks to the executor through the request queue
/// - processing results: unblocking downstream tasks, retrying, cancelling
///   everything below a failed task
/// - persisting its state as a [`Snapshot`] between invocations
#[derive(Debug)]
pub struct Scheduler {
    config: Config,
    graph: Arc<Graph>,
    cache: Cache,
    statuses: HashMap<TaskId, Status>,
}

impl Scheduler {
    /// Construct a scheduler over an already built graph. Fails if the graph
    /// is not a valid DAG.
    pub fn new(config: Config, graph: Graph) -> Result<Self> {
        graph.validate()?;
        graph.ensure_acyclic()?;

        let statuses = graph.ids().map(|id| (id, Status::NotStarted)).collect();
        let cache = Cache::new(config.build_output_dir());

        Ok(Self {
            config,
            graph: Arc::new(graph),
            cache,
            statuses,
        })
    }

    /// Fresh scheduler over the workflow named by `tasks.source`.
    pub fn from_config(config: Config) -> Result<Self> {
        let graph = load_workflow(&config, None)?;
        Self::new(config, graph)
    }

    /// Restore the snapshot in `data_dir`, or build a fresh scheduler when
    /// there is none.
    pub fn load(config: Config, data_dir: &Path) -> Result<Self> {
        match Snapshot::load(data_dir)? {
            Some(snapshot) => Ok(Self::from_snapshot(config, snapshot)),
            None => {
                info!(data_dir = ?data_dir, "no snapshot; starting from the workflow source");
                Self::from_config(config)
            }
        }
    }

    /// Scheduler over a restored snapshot, as-is.
    pub fn from_snapshot(config: Config, snapshot: Snapshot) -> Self {
        let Snapshot {
            graph,
            cache,
            statuses,
            ..
        } = snapshot;

        let mut statuses: HashMap<TaskId, Status> = statuses.into_iter().collect();
        for id in graph.ids() {
            statuses.entry(id).or_default();
        }

        Self {
            config,
            graph: Arc::new(graph),
            cache,
            statuses,
        }
    }

    pub fn save(&self, data_dir: &Path) -> Result<PathBuf> {
        let statuses: BTreeMap<TaskId, Status> =
            self.statuses.iter().map(|(id, s)| (*id, *s)).collect();
        Snapshot::new((*self.graph).clone(), self.cache.clone(), statuses).save(data_dir)
    }

    /// Swap in a freshly loaded graph (e.g. after the workflow file changed).
    ///
    /// Tasks that kept their id keep their status; new tasks start as
    /// `NotStarted`; records of tasks that disappeared are dropped.
    pub fn replace_graph(&mut self, graph: Graph) -> Result<()> {
        graph.validate()?;
        graph.ensure_acyclic()?;

        let statuses = graph
            .ids()
            .map(|id| (id, self.statuses.get(&id).copied().unwrap_or_default()))
            .collect();
        self.cache.prune(&graph);
        self.statuses = statuses;
        self.graph = Arc::new(graph);
        debug!(tasks = self.graph.len(), "replaced task graph");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }

    pub fn status(&self, id: TaskId) -> Status {
        self.statuses.get(&id).copied().unwrap_or_default()
    }

    /// Status of a task by name.
    pub fn status_of(&self, name: &str) -> Option<Status> {
        self.graph.get_by_name(name).map(|t| self.status(t.id()))
    }

    /// Override a status, e.g. to restore state in tests or tooling.
    pub fn set_status(&mut self, id: TaskId, status: Status) -> Result<()> {
        if !self.graph.contains(id) {
            return Err(BakedagError::TaskNotFound(id.to_string()));
        }
        self.statuses.insert(id, status);
        Ok(())
    }

    /// Whether `id` may be handed to the executor now.
    pub fn is_ready(&self, id: TaskId) -> bool {
        is_ready(&self.graph, &self.statuses, &self.cache, id)
    }

    /// Summary of the current statuses.
    pub fn report(&self) -> Result<BuildReport> {
        let order = self.graph.topological_order()?;
        Ok(BuildReport::collect(&self.graph, &order, |id| self.status(id)))
    }

    /// Run one build to completion.
    ///
    /// The executor (and its workers) and the result loop run concurrently;
    /// the call returns once no task is pending anymore. Task failures are
    /// reported in the returned [`BuildReport`], not as an error.
    pub async fn build(&mut self, backend: Arc<dyn ExecutorBackend>) -> Result<BuildReport> {
        self.reset_unfinished();

        let requests = Arc::new(RequestQueue::new(
            self.config.queue_kind(),
            self.config.queue_size(),
        ));
        let results = Arc::new(ResultQueue::fifo(self.config.queue_size()));

        let placeholder = Cache::new(self.config.build_output_dir());
        let cache = Arc::new(Mutex::new(std::mem::replace(&mut self.cache, placeholder)));

        let executor = Executor::new(
            backend,
            Arc::clone(&self.graph),
            Arc::clone(&cache),
            Arc::clone(&requests),
            Arc::clone(&results),
        )
        .with_workers(self.config.workers());

        info!(
            tasks = self.graph.len(),
            queue = ?self.config.queue_kind(),
            workers = executor.workers(),
            "starting build"
        );
        let executor_handle = tokio::spawn(executor.run());

        let mut run = BuildRun {
            graph: Arc::clone(&self.graph),
            statuses: &mut self.statuses,
            attempts: HashMap::new(),
            settled: HashSet::new(),
            backlog: VecDeque::new(),
            pending: 0,
            retry_budget: self.config.retry_budget(),
            failed: false,
        };

        let outcome = match run.seed(&cache).await {
            Ok(()) => run.process_results(&cache, &requests, &results).await,
            Err(e) => Err(e),
        };
        let partial_failure = run.failed;

        // Whatever happened, let the workers drain and stop.
        requests.close();
        results.close();
        let joined = executor_handle.await;

        self.cache = match Arc::try_unwrap(cache) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        };

        outcome?;
        joined.map_err(|e| BakedagError::Other(anyhow::anyhow!("executor task failed: {e}")))?;

        let report = self.report()?;
        if partial_failure {
            warn!(failed = ?report.failed, cancelled = ?report.cancelled, "build finished with failures");
        } else {
            info!(
                succeeded = report.succeeded.len(),
                skipped = report.skipped.len(),
                "build finished"
            );
        }
        Ok(report)
    }

    /// Statuses that only meant something for the previous build go back to
    /// `NotStarted`.
    fn reset_unfinished(&mut self) {
        for (id, status) in self.statuses.iter_mut() {
            if matches!(
                status,
                Status::Failed | Status::Cancelled | Status::Queued | Status::Running
            ) {
                debug!(task = %self.graph.name_of(*id), from = %status, "resetting status");
                *status = Status::NotStarted;
            }
        }
    }
}

/// Readiness of a single task against the current statuses and cache.
fn is_ready(graph: &Graph, statuses: &HashMap<TaskId, Status>, cache: &Cache, id: TaskId) -> bool {
    let status_of = |id: &TaskId| statuses.get(id).copied().unwrap_or_default();
    let upstream_done = || graph.upstream_of(id).iter().all(|up| status_of(up).is_successful());

    match status_of(&id) {
        Status::Queued | Status::Running => false,
        Status::Failed | Status::Cancelled => false,
        Status::NotStarted => upstream_done(),
        Status::Success | Status::Skipped => {
            let Some(task) = graph.get(id) else {
                return false;
            };
            upstream_done() && cache.is_stale(task, graph)
        }
    }
}

/// Mutable state of one build, owned by the result loop.
struct BuildRun<'s> {
    graph: Arc<Graph>,
    statuses: &'s mut HashMap<TaskId, Status>,
    attempts: HashMap<TaskId, u32>,
    /// Tasks whose outcome for this build is known. Only these count as
    /// upstream for their downstream tasks.
    settled: HashSet<TaskId>,
    /// Jobs that did not fit into the request queue yet.
    backlog: VecDeque<Job>,
    /// Jobs handed out whose report has not come back.
    pending: usize,
    retry_budget: u32,
    failed: bool,
}

impl BuildRun<'_> {
    fn status(&self, id: TaskId) -> Status {
        self.statuses.get(&id).copied().unwrap_or_default()
    }

    fn set_status(&mut self, id: TaskId, next: Status) {
        let current = self.status(id);
        if !current.can_transition_to(next) {
            warn!(
                task = %self.graph.name_of(id),
                from = %current,
                to = %next,
                "ignoring illegal status transition"
            );
            return;
        }
        self.statuses.insert(id, next);
    }

    /// Walk the graph in topological order and resolve every task whose
    /// upstream is already settled. Tasks below a queued task wait for it.
    async fn seed(&mut self, cache: &Mutex<Cache>) -> Result<()> {
        let order = self.graph.topological_order()?;
        let cache = cache.lock().await;

        for id in order {
            self.resolve(id, &cache);
        }

        info!(queued = self.pending, "seeded initial ready tasks");
        Ok(())
    }

    /// Whether every direct upstream task settled successfully in this build.
    fn upstream_settled(&self, id: TaskId) -> bool {
        self.graph
            .upstream_of(id)
            .iter()
            .all(|up| self.settled.contains(up) && self.status(*up).is_successful())
    }

    /// Queue `id` once its upstream has settled, or confirm a task completed
    /// in an earlier build as `Skipped` and carry on below it.
    fn resolve(&mut self, id: TaskId, cache: &Cache) {
        let mut work = VecDeque::from([id]);

        while let Some(id) = work.pop_front() {
            if self.settled.contains(&id) || !self.upstream_settled(id) {
                continue;
            }

            match self.status(id) {
                Status::NotStarted => self.enqueue(id, 1),
                Status::Success | Status::Skipped => {
                    let stale = self
                        .graph
                        .get(id)
                        .is_some_and(|task| cache.is_stale(task, &self.graph));
                    if stale {
                        self.enqueue(id, 1);
                    } else {
                        debug!(task = %self.graph.name_of(id), "up to date");
                        self.set_status(id, Status::Skipped);
                        self.settled.insert(id);
                        work.extend(self.graph.downstream_of(id).iter().copied());
                    }
                }
                Status::Queued | Status::Running | Status::Failed | Status::Cancelled => {}
            }
        }
    }

    fn enqueue(&mut self, id: TaskId, attempt: u32) {
        let Some(task) = self.graph.get(id) else {
            return;
        };
        let job = Job::for_task(task, attempt);
        info!(task = %job.name, id = %id, attempt, "queued task");

        self.set_status(id, Status::Queued);
        self.attempts.insert(id, attempt);
        self.pending += 1;
        self.backlog.push_back(job);
    }

    /// Move as much of the backlog as fits into the request queue.
    fn flush_backlog(&mut self, requests: &RequestQueue) {
        while let Some(job) = self.backlog.pop_front() {
            if let Err(job) = requests.try_put(job) {
                self.backlog.push_front(job);
                break;
            }
        }
    }

    /// Consume reports until nothing is pending, then close the request
    /// queue.
    async fn process_results(
        &mut self,
        cache: &Mutex<Cache>,
        requests: &RequestQueue,
        results: &ResultQueue,
    ) -> Result<()> {
        loop {
            self.flush_backlog(requests);

            if self.pending == 0 {
                debug!("no pending tasks left; closing request queue");
                requests.close();
                return Ok(());
            }

            let report = match self.backlog.front().cloned() {
                // Request queue is full: wait for either a free slot or a
                // report, whichever comes first.
                Some(job) => {
                    tokio::select! {
                        report = results.pop() => report,
                        put = requests.put(job) => {
                            put?;
                            self.backlog.pop_front();
                            continue;
                        }
                    }
                }
                None => results.pop().await,
            };

            let Some(report) = report else {
                return Err(BakedagError::QueueClosed);
            };
            self.on_report(report, cache).await;
        }
    }

    async fn on_report(&mut self, report: TaskReport, cache: &Mutex<Cache>) {
        self.pending = self.pending.saturating_sub(1);
        debug!(
            task = %report.name,
            status = %report.status,
            attempt = report.attempt,
            pending = self.pending,
            "received result"
        );

        match report.status {
            Status::Success | Status::Skipped => {
                if report.status == Status::Success {
                    self.set_status(report.id, Status::Running);
                }
                self.set_status(report.id, report.status);
                self.settled.insert(report.id);
                self.schedule_downstream(report.id, cache).await;
            }
            _ => self.on_failure(report),
        }
    }

    async fn schedule_downstream(&mut self, id: TaskId, cache: &Mutex<Cache>) {
        let downstream = self.graph.downstream_of(id).to_vec();
        let cache = cache.lock().await;
        for down in downstream {
            self.resolve(down, &cache);
            if !self.settled.contains(&down) && !self.status(down).is_in_flight() {
                debug!(
                    task = %self.graph.name_of(down),
                    status = %self.status(down),
                    "downstream task not ready yet"
                );
            }
        }
    }

    fn on_failure(&mut self, report: TaskReport) {
        let id = report.id;
        let error = report.error.as_deref().unwrap_or("unknown error");
        let attempt = self.attempts.get(&id).copied().unwrap_or(report.attempt);

        if attempt <= self.retry_budget {
            warn!(
                task = %report.name,
                attempt,
                retries_left = self.retry_budget - attempt,
                error,
                "task failed; retrying"
            );
            self.set_status(id, Status::Failed);
            self.enqueue(id, attempt + 1);
            return;
        }

        warn!(task = %report.name, attempt, error, "task failed");
        self.failed = true;
        self.statuses.insert(id, Status::Failed);
        self.settled.insert(id);

        for down in self.graph.descendants(id) {
            let status = self.status(down);
            if status.is_in_flight() {
                debug!(task = %self.graph.name_of(down), "descendant in flight; not cancelling");
                continue;
            }
            info!(task = %self.graph.name_of(down), because = %report.name, "cancelled task");
            self.statuses.insert(down, Status::Cancelled);
        }
    }
}
