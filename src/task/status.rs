// src/task/status.rs

//! Task status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a task within a build.
///
/// ```text
/// NotStarted -> Queued -> Running -> Success | Failed | Cancelled
///                  \-> Skipped (cache hit)
/// ```
///
/// `Skipped` is also reachable from `Success` when a task completed in a
/// previous invocation and re-evaluation finds nothing to rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
    Skipped,
}

impl Default for Status {
    fn default() -> Self {
        Status::NotStarted
    }
}

impl Status {
    /// `Success` or `Skipped`: downstream tasks may consume this task's outputs.
    pub fn is_successful(self) -> bool {
        matches!(self, Status::Success | Status::Skipped)
    }

    /// Already handed to the executor and not yet reported back.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Status::Queued | Status::Running)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;

        match (self, next) {
            (NotStarted, Queued) | (NotStarted, Cancelled) => true,
            (Queued, Running) | (Queued, Skipped) | (Queued, Failed) => true,
            (Running, Success) | (Running, Failed) => true,
            // Completed in an earlier invocation: rebuild or confirm.
            (Success, Queued) | (Skipped, Queued) => true,
            (Success, Skipped) => true,
            (Success, Cancelled) | (Skipped, Cancelled) => true,
            // Retry after a failed attempt.
            (Failed, Queued) => true,
            // Reset between invocations.
            (Failed, NotStarted)
            | (Cancelled, NotStarted)
            | (Queued, NotStarted)
            | (Running, NotStarted) => true,
            (a, b) => a == b,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotStarted => "not_started",
            Status::Queued => "queued",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
            Status::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
