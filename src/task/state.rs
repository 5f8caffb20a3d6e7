//! `TaskState`: the lifecycle of one task in one execution (spec 3, row
//! `TaskState`). Run and clean each get an independent copy of the same
//! shape, since a task may finish running long before it is cleaned.

use std::fmt;

/// Run-phase state. Transition rules are enforced by
/// [`crate::task::wrapper::TaskWrapper`] and [`crate::engine::scheduler::Scheduler`],
/// not by this type itself — it is a plain data carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Enqueued,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskState {
    /// True once the task will never run again this execution — the
    /// condition the scheduler uses to decide a dependent is unblocked.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn is_running(self) -> bool {
        matches!(self, Self::Enqueued | Self::Running)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Enqueued => "enqueued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Clean-phase state, identical shape to [`TaskState`] but tracked
/// independently (spec 3: "clean-state mirrors the same set").
pub type CleanState = TaskState;
