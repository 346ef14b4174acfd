// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod task;
pub mod types;
pub mod workflow;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{Config, load_and_validate, load_materialized, materialize};
use crate::dag::{BuildReport, Scheduler, Snapshot};
use crate::exec::{ExecutorBackend, LocalExecutor};
use crate::workflow::load_workflow;

/// How a command ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// A build finished but some tasks failed.
    TasksFailed,
}

/// High-level entry point used by `main.rs`.
///
/// Loads the configuration the subcommand needs, sets up logging and
/// dispatches.
pub async fn run(args: CliArgs) -> Result<Outcome> {
    let data_dir = args.data_dir.as_path();

    let cfg = match &args.command {
        Command::Init { config } => load_and_validate(config)
            .with_context(|| format!("loading configuration from {config:?}")),
        _ => load_materialized(data_dir).context("loading resolved configuration"),
    };

    // Logging first, so that configuration errors are still reported
    // through the same channel.
    logging::init_logging(args.log_level, cfg.as_ref().ok().map(Config::log_level))?;
    let cfg = cfg?;
    debug!(command = ?args.command, data_dir = ?data_dir, "dispatching command");

    match args.command {
        Command::Init { .. } => {
            let scheduler = init(cfg, data_dir)?;
            println!(
                "initialized {} task(s) in {}",
                scheduler.graph().len(),
                data_dir.display()
            );
            Ok(Outcome::Done)
        }
        Command::Build => {
            let backend = Arc::new(LocalExecutor::from_config(&cfg));
            let report = build(cfg, data_dir, backend).await?;
            print!("{report}");
            if report.is_success() {
                Ok(Outcome::Done)
            } else {
                Ok(Outcome::TasksFailed)
            }
        }
        Command::List => {
            let scheduler = open_scheduler(cfg, data_dir)?;
            print!("{}", render_listing(&scheduler)?);
            Ok(Outcome::Done)
        }
        Command::Clean => {
            clean(&cfg)?;
            Ok(Outcome::Done)
        }
    }
}

/// Write the resolved configuration and an initial snapshot into `data_dir`.
///
/// An existing snapshot is kept (with the workflow reloaded on top), so
/// re-running `init` does not throw the cache away.
pub fn init(cfg: Config, data_dir: &Path) -> Result<Scheduler> {
    materialize(&cfg, data_dir)?;
    let scheduler = open_scheduler(cfg, data_dir)?;
    scheduler.save(data_dir)?;
    info!(tasks = scheduler.graph().len(), "initialized");
    Ok(scheduler)
}

/// Load (or create) the scheduler and run one build, saving the snapshot
/// afterwards whatever the outcome of the tasks.
pub async fn build(
    cfg: Config,
    data_dir: &Path,
    backend: Arc<dyn ExecutorBackend>,
) -> Result<BuildReport> {
    let mut scheduler = open_scheduler(cfg, data_dir)?;
    let report = scheduler.build(backend).await?;
    scheduler.save(data_dir)?;
    Ok(report)
}

/// Remove build outputs and task workspaces. The snapshot stays; the cache
/// then reports every task stale.
pub fn clean(cfg: &Config) -> Result<()> {
    for dir in [cfg.build_output_dir(), cfg.executor_workspace()] {
        if dir.exists() {
            std::fs::remove_dir_all(dir).with_context(|| format!("removing {dir:?}"))?;
            info!(dir = ?dir, "removed");
        }
    }
    Ok(())
}

/// Restore the snapshot if there is one and reload the workflow source on
/// top of it; tasks keep their ids (and thus their cache records) by name.
pub fn open_scheduler(cfg: Config, data_dir: &Path) -> Result<Scheduler> {
    let Some(snapshot) = Snapshot::load(data_dir)? else {
        return Ok(Scheduler::from_config(cfg)?);
    };

    let mut scheduler = Scheduler::from_snapshot(cfg.clone(), snapshot);
    let graph = load_workflow(&cfg, Some(scheduler.graph()))?;
    scheduler.replace_graph(graph)?;
    Ok(scheduler)
}

/// Tasks in topological order with status, staleness and dependencies.
pub fn render_listing(scheduler: &Scheduler) -> Result<String> {
    let graph = scheduler.graph();
    let mut out = String::new();

    for id in graph.topological_order()? {
        let Some(task) = graph.get(id) else {
            continue;
        };
        let stale = if scheduler.cache().is_stale(task, graph) {
            "stale"
        } else {
            "up-to-date"
        };
        out.push_str(&format!(
            "{:<20} {:<12} {:<11} {}\n",
            task.name(),
            scheduler.status(id).as_str(),
            stale,
            task.kind().label()
        ));

        let after: Vec<String> = task.upstream().iter().map(|up| graph.name_of(*up)).collect();
        if !after.is_empty() {
            out.push_str(&format!("    after: {}\n", after.join(", ")));
        }
    }
    Ok(out)
}
