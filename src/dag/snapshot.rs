// src/dag/snapshot.rs

//! Durable scheduler state between invocations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::Cache;
use crate::dag::Graph;
use crate::errors::{BakedagError, Result};
use crate::task::{Status, TaskId};

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Bumped whenever the on-disk layout changes incompatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Graph, cache and per-task statuses as persisted in `snapshot.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub graph: Graph,
    pub cache: Cache,
    pub statuses: BTreeMap<TaskId, Status>,
}

impl Snapshot {
    pub fn new(graph: Graph, cache: Cache, statuses: BTreeMap<TaskId, Status>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            graph,
            cache,
            statuses,
        }
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(SNAPSHOT_FILE)
    }

    /// Write the snapshot into `data_dir`, replacing any previous one.
    pub fn save(&self, data_dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(data_dir);
        fs::create_dir_all(data_dir).map_err(|source| BakedagError::CacheIo {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| BakedagError::Other(anyhow::Error::new(e).context("serializing snapshot")))?;

        // Write next to the target and rename, so a crash never leaves a
        // truncated snapshot behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| BakedagError::CacheIo {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| BakedagError::CacheIo {
            path: path.clone(),
            source,
        })?;

        info!(path = ?path, tasks = self.graph.len(), "saved snapshot");
        Ok(path)
    }

    /// Read the snapshot from `data_dir`.
    ///
    /// `Ok(None)` when there is none yet. A snapshot that exists but cannot
    /// be read, parsed or checked is [`BakedagError::SnapshotCorrupt`].
    pub fn load(data_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(data_dir);
        if !path.exists() {
            debug!(path = ?path, "no snapshot found");
            return Ok(None);
        }

        let corrupt = |reason: String| BakedagError::SnapshotCorrupt {
            path: path.clone(),
            reason,
        };

        let bytes = fs::read(&path).map_err(|e| corrupt(format!("unreadable: {e}")))?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("invalid JSON: {e}")))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        snapshot
            .graph
            .validate()
            .and_then(|()| snapshot.graph.ensure_acyclic())
            .map_err(|e| corrupt(e.to_string()))?;
        if let Some(id) = snapshot.statuses.keys().find(|id| !snapshot.graph.contains(**id)) {
            return Err(corrupt(format!("status recorded for unknown task {id}")));
        }

        info!(path = ?path, tasks = snapshot.graph.len(), "loaded snapshot");
        Ok(Some(snapshot))
    }
}
