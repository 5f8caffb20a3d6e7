//! taski: a parallel task-graph execution engine.
//!
//! A task is a Rust type wearing `#[taski::task]` over its `TaskBody` impl.
//! Its dependencies are never declared by hand — the attribute macro embeds
//! the `run` method's own source, and [`analyzer::dependencies_of`] parses
//! that source to find every other task it statically references. From
//! there taski builds a [`DependencyGraph`], schedules ready tasks onto a
//! bounded [`WorkerPool`], and runs a mirrored teardown pass once everything
//! has completed.
//!
//! ```ignore
//! use taski::{task, Described, TaskBody, TaskContext, TaskResult, Exports};
//!
//! struct FetchUser;
//!
//! #[task(exports = ["id"])]
//! impl TaskBody for FetchUser {
//!     fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<Exports> {
//!         let mut out = Exports::new();
//!         out.set("id", 42u64);
//!         Ok(out)
//!     }
//! }
//!
//! struct Greet;
//!
//! #[task]
//! impl TaskBody for Greet {
//!     fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<Exports> {
//!         let id = ctx.dep::<FetchUser>()?.get::<u64>("id").unwrap();
//!         println!("hello, user {id}");
//!         Ok(Exports::new())
//!     }
//! }
//!
//! taski::Taski::execute(Greet::descriptor(), Default::default()).unwrap();
//! ```
//!
//! Logging goes through the `log` facade the same way `dagrs` itself wires
//! up `env_logger`; see [`env_logger::init`] or your own subscriber of
//! choice.

pub mod analyzer;
pub mod engine;
pub mod env;
pub mod error;
pub mod observer;
pub mod task;

pub use engine::{DependencyGraph, Executor, Registry, Scheduler};
pub use env::{args, env as current_env, Args, Env};
pub use error::{AggregateError, AnalyzerError, CycleError, TaskAbortException, TaskError, TaskFailure, TaskiError};
pub use observer::{progress_mode, GraphView, LoggingObserver, Observer, Phase, ProgressMode, SharedObserver};
pub use task::{
    all_task_classes, Abort, Described, Dependency, Exports, SectionBody, TaskBody, TaskClass, TaskClassEntry,
    TaskContext, TaskKind, TaskResult, Value,
};

pub use taski_derive::{section, task};

/// Re-exported so `#[taski::task]`/`#[taski::section]`-expanded code can
/// reach `inventory::submit!` without every downstream crate adding
/// `inventory` to its own `Cargo.toml`.
pub use inventory;

/// Top-level convenience wrapper around [`Executor`], matching the shape
/// of `dagrs::Dag::with_tasks(..).start()` — build one, run it, and (for
/// the common case) let it clean up after itself in `Drop`.
pub struct Taski;

impl Taski {
    /// Runs `root` and everything it statically depends on to completion,
    /// using the default set of observers (a [`LoggingObserver`] unless
    /// `TASKI_PROGRESS_DISABLE=1` is set).
    pub fn execute(root: &'static TaskClass, args: Args) -> Result<(), TaskiError> {
        let executor = Executor::with_default_observers();
        executor.execute(root, args)
    }

    /// Runs `root`, then immediately tears down everything it completed, in
    /// reverse dependency order. The aggregate error returned, if any, only
    /// ever comes from the run pass — clean failures are logged by the
    /// observer but don't change the run's own outcome (spec 4.8).
    pub fn execute_with_clean(root: &'static TaskClass, args: Args) -> Result<(), TaskiError> {
        let executor = Executor::with_default_observers();
        let result = executor.execute(root, args);
        if let Err(err) = executor.execute_clean(root) {
            log::warn!("clean phase reported failures: {err}");
        }
        result
    }
}
