// src/dag/report.rs

use std::fmt;

use crate::dag::Graph;
use crate::task::{Status, TaskId};

/// Outcome of one build, task names grouped by final status in topological
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub cancelled: Vec<String>,
}

impl BuildReport {
    pub(crate) fn collect(
        graph: &Graph,
        order: &[TaskId],
        status_of: impl Fn(TaskId) -> Status,
    ) -> Self {
        let mut report = BuildReport::default();
        for id in order {
            let name = graph.name_of(*id);
            match status_of(*id) {
                Status::Success => report.succeeded.push(name),
                Status::Skipped => report.skipped.push(name),
                Status::Failed => report.failed.push(name),
                Status::Cancelled => report.cancelled.push(name),
                _ => {}
            }
        }
        report
    }

    /// No task failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len() + self.cancelled.len()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} succeeded, {} skipped, {} failed, {} cancelled",
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len(),
            self.cancelled.len()
        )?;
        for (label, names) in [
            ("failed", &self.failed),
            ("cancelled", &self.cancelled),
            ("skipped", &self.skipped),
        ] {
            if !names.is_empty() {
                writeln!(f, "  {label}: {}", names.join(", "))?;
            }
        }
        Ok(())
    }
}
