//! The observer protocol (spec 6) — the sole contract between the core
//! and every display/logger collaborator. Progress displays and log
//! formatters themselves are out of scope (spec 1); this module only
//! defines the protocol and ships one trivial built-in observer backed by
//! the `log` crate, matching `dagrs`'s own reliance on `log` +
//! `env_logger` for its ambient logging.

use std::sync::Arc;
use std::time::SystemTime;

use crate::engine::graph::DependencyGraph;
use crate::error::TaskError;
use crate::task::descriptor::TaskClass;
use crate::task::state::TaskState;

/// Which pass is currently executing; exposed read-only to observers
/// through [`GraphView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Run,
    Clean,
}

/// A narrow, read-only facade over the executor's graph and phase, handed
/// to observers at registration (Design Notes: "Observer pull of private
/// state ... expose through a narrow, read-only facade ... do not expose
/// mutable state").
pub struct GraphView<'a> {
    graph: &'a DependencyGraph,
    phase: Phase,
}

impl<'a> GraphView<'a> {
    pub(crate) fn new(graph: &'a DependencyGraph, phase: Phase) -> Self {
        Self { graph, phase }
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        self.graph
    }

    pub fn current_phase(&self) -> Phase {
        self.phase
    }
}

/// Implemented by progress displays, loggers, and test doubles. Every
/// method has a default no-op body so an observer only needs to override
/// what it cares about.
pub trait Observer: Send + Sync {
    fn on_ready(&self, _view: &GraphView<'_>) {}

    fn on_start(&self, _view: &GraphView<'_>) {}

    fn on_task_updated(
        &self,
        _task: &'static TaskClass,
        _previous: TaskState,
        _current: TaskState,
        _timestamp: SystemTime,
        _error: Option<&TaskError>,
    ) {
    }

    fn on_stop(&self, _view: &GraphView<'_>) {}
}

/// Which built-in textual rendering `TASKI_PROGRESS_MODE` asked for.
/// Rendering a `tree`/`simple`/`plain` display is an external
/// collaborator's job (spec 1's Non-goals exclude "progress displays and
/// terminal rendering" from the core) — `taski` only reads and exposes the
/// selection via [`progress_mode`]; every mode still falls back to
/// [`LoggingObserver`] unless a caller installs its own observer for the
/// mode it cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Tree,
    Simple,
    Log,
    Plain,
}

/// Reads `TASKI_PROGRESS_MODE` (spec 6); unset or unrecognised values
/// default to `Log`, the one mode the core itself can render.
pub fn progress_mode() -> ProgressMode {
    match std::env::var("TASKI_PROGRESS_MODE").as_deref() {
        Ok("tree") => ProgressMode::Tree,
        Ok("simple") => ProgressMode::Simple,
        Ok("plain") => ProgressMode::Plain,
        _ => ProgressMode::Log,
    }
}

/// Bridges the observer protocol onto the `log` facade. Installed by
/// default unless `TASKI_PROGRESS_DISABLE=1` is set (spec 6).
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_ready(&self, view: &GraphView<'_>) {
        log::info!("dependency graph ready, {} task(s)", view.dependency_graph().len());
    }

    fn on_start(&self, view: &GraphView<'_>) {
        log::info!("execution starting, phase={:?}", view.current_phase());
    }

    fn on_task_updated(
        &self,
        task: &'static TaskClass,
        previous: TaskState,
        current: TaskState,
        _timestamp: SystemTime,
        error: Option<&TaskError>,
    ) {
        match error {
            Some(err) => log::error!("{}: {previous} -> {current}: {err}", task.name),
            None => log::debug!("{}: {previous} -> {current}", task.name),
        }
    }

    fn on_stop(&self, view: &GraphView<'_>) {
        log::info!("execution stopped, phase={:?}", view.current_phase());
    }
}

pub type SharedObserver = Arc<dyn Observer>;
