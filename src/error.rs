//! Error taxonomy: one kind per failure mode in the execution lifecycle.
//!
//! Mirrors the way `dagrs::engine::error::DagError` wraps a narrower
//! `RunningError` — here `TaskiError` is the top-level enum callers match
//! on, and `TaskError`/`AggregateError` carry the task-scoped detail.

use std::fmt;
use std::sync::Arc;

use crate::task::descriptor::TaskClass;

/// A directed cycle found while building the dependency graph.
///
/// `sccs` lists every strongly connected component of size > 1, plus every
/// self-dependent node as a one-element component (see spec 4.2 edge case).
#[derive(Debug, Clone, thiserror::Error)]
#[error("dependency cycle detected: {}", format_sccs(.sccs))]
pub struct CycleError {
    pub sccs: Vec<Vec<&'static TaskClass>>,
}

fn format_sccs(sccs: &[Vec<&'static TaskClass>]) -> String {
    sccs.iter()
        .map(|scc| {
            let names: Vec<&str> = scc.iter().map(|t| t.name).collect();
            format!("[{}]", names.join(" -> "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A user exception raised from inside a task's `run`/`clean` body, wrapped
/// with the task class that raised it so `AggregateError` can later match it
/// by containment (spec 7.4).
#[derive(Debug, Clone, thiserror::Error)]
#[error("task {} failed: {cause}", .task_class.name)]
pub struct TaskError {
    pub task_class: &'static TaskClass,
    pub cause: Arc<str>,
}

impl TaskError {
    pub fn new(task_class: &'static TaskClass, cause: impl fmt::Display) -> Self {
        Self {
            task_class,
            cause: Arc::from(cause.to_string()),
        }
    }
}

/// One task's failure as recorded for aggregation.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task_class: &'static TaskClass,
    pub error: TaskError,
}

/// Collects every parallel failure from one run or clean pass.
///
/// `contains::<E>()`-style open matching isn't available in Rust, so
/// callers use [`AggregateError::contains_task`] instead of the Ruby
/// `rescue TaskClass::Error` trick (Design Notes, "aggregated-error
/// transparent match").
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} task(s) failed: {}", .failures.len(), summarize(.failures))]
pub struct AggregateError {
    pub failures: Vec<TaskFailure>,
}

fn summarize(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(|f| f.task_class.name)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AggregateError {
    pub fn first_cause(&self) -> Option<&TaskError> {
        self.failures.first().map(|f| &f.error)
    }

    /// True iff some failure in this aggregate came from `task_class`.
    /// The caller-side replacement for `rescue TaskClass::Error`.
    pub fn contains_task(&self, task_class: &'static TaskClass) -> bool {
        self.failures
            .iter()
            .any(|f| f.task_class.name == task_class.name)
    }
}

/// Raised by a task to cooperatively stop the run: no further task
/// transitions Pending -> Enqueued, but already-running tasks finish.
#[derive(Debug, Clone, thiserror::Error)]
#[error("execution aborted by task {}: {reason}", .task_class.name)]
pub struct TaskAbortException {
    pub task_class: &'static TaskClass,
    pub reason: Arc<str>,
}

impl TaskAbortException {
    pub fn new(task_class: &'static TaskClass, reason: impl fmt::Display) -> Self {
        Self {
            task_class,
            reason: Arc::from(reason.to_string()),
        }
    }
}

/// Failure to parse or resolve a task's embedded source during analysis.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzerError {
    #[error("failed to parse source embedded for task {0}: {1}")]
    Parse(&'static str, String),
}

/// Top-level error type returned by [`crate::Executor::execute`].
#[derive(Debug, thiserror::Error)]
pub enum TaskiError {
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Abort(#[from] TaskAbortException),
}
