// src/cache/record.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::fingerprint::FingerprintMap;
use crate::task::TaskId;

/// What a task and its direct upstream looked like at its last successful
/// build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    pub task_id: TaskId,
    /// Input path (as declared) → fingerprint.
    pub inputs: FingerprintMap,
    /// Output path (relative to the build-output dir) → fingerprint.
    pub outputs: FingerprintMap,
    /// Upstream task → copy of that task's recorded output fingerprints.
    pub upstream: BTreeMap<TaskId, FingerprintMap>,
}
