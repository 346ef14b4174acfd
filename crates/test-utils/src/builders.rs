#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use bakedag::config::{Config, DEFAULT_DATA_DIR, RawConfig};
use bakedag::task::{Task, TaskKind};
use bakedag::types::QueueKind;
use tempfile::TempDir;

/// A temporary project directory: sources, build outputs and workspaces all
/// live below it and disappear with it.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root().join(rel)
    }

    /// Write a file (creating parent directories) and return its absolute path.
    pub fn write(&self, rel: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(&path, contents).expect("failed to write file");
        path
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> String {
        fs::read_to_string(self.path(rel)).expect("failed to read file")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.path("build")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path(DEFAULT_DATA_DIR)
    }

    /// Config builder with every path pointing into this sandbox.
    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::new(self.root())
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Config`] to simplify test setup.
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    /// Defaults, with relative paths resolved against `root`.
    pub fn new(root: &Path) -> Self {
        let mut raw = RawConfig::default();
        raw.resolve_paths(root);
        Self { raw }
    }

    pub fn queue(mut self, kind: QueueKind, size: usize) -> Self {
        self.raw.system.scheduler.queue.kind = kind;
        self.raw.system.scheduler.queue.size = size;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.raw.system.scheduler.retry = retry;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.raw.system.executor.workers = workers;
        self
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw.tasks.source = path.into();
        self
    }

    pub fn raw(self) -> RawConfig {
        self.raw
    }

    pub fn build(self) -> Config {
        Config::try_from(self.raw).expect("Failed to build valid config from builder")
    }
}

/// Shell task with the given inputs and outputs.
pub fn task(name: &str, inputs: &[&Path], outputs: &[&str]) -> Task {
    Task::new(name, TaskKind::shell("true"))
        .with_inputs(inputs.iter().copied())
        .with_outputs(outputs.iter().copied())
}

/// Shell task with no declared files.
pub fn bare_task(name: &str) -> Task {
    Task::new(name, TaskKind::shell("true"))
}
