//! The user-facing traits: `TaskBody`, `SectionBody`, and the
//! `TaskContext` handle a running body uses to read its dependencies'
//! exports. `Described` replaces Ruby's "pass the class itself" with a
//! per-type associated function generated by `#[taski::task]`/`#[taski::section]`.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::error::TaskError;
use crate::task::descriptor::TaskClass;
use crate::task::value::Exports;

pub type TaskResult<T> = Result<T, Box<dyn Error + Send + Sync + 'static>>;

/// Implemented automatically for any type annotated with
/// `#[taski::task]` or `#[taski::section]`; gives the engine a way to turn
/// a Rust type parameter back into the `&'static TaskClass` that identifies
/// it (spec's "TaskClass" entity has no runtime analogue of its own).
pub trait Described {
    fn descriptor() -> &'static TaskClass;
}

/// A unit of work. `run` is invoked at most once per execution, after every
/// dependency the analyzer found for it has completed or been skipped.
pub trait TaskBody: Send + Sync + 'static {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<Exports>;

    /// Reverse-order teardown; default no-op, since most tasks have
    /// nothing to clean.
    fn clean(&self, _ctx: &TaskContext<'_>) -> TaskResult<()> {
        Ok(())
    }
}

/// A late-bound task: the analyzer lists `candidates` statically (so the
/// DAG can be built without running user code), and `select` — the Rust
/// rename of the original's `impl`, since `impl` is a reserved word — picks
/// exactly one of them once per execution.
///
/// `select` must be pure with respect to the dependency graph: the
/// execution-mode analyzer does not walk it for edges (see
/// `crate::analyzer`), so it must not itself read another task's export —
/// only branch over the pre-declared candidate constants.
///
/// A fallible return lets a selector reject an unavailable/misconfigured
/// environment: an `Err` here fails the section's own wrapper exactly the
/// way a task's `run` failing does (spec 4.7, "if the selector throws, the
/// section's wrapper is Failed; all candidates remain Pending until pruned
/// as Skipped at end-of-run").
pub trait SectionBody: Send + Sync + 'static {
    fn select(&self, ctx: &TaskContext<'_>) -> TaskResult<&'static TaskClass>;
}

/// Raised by a task body to cooperatively abort the whole execution (spec
/// 5, `TaskAbortException`). Rust has no exceptions, so this is a plain
/// error type the wrapper recognises via `downcast_ref` rather than a
/// distinguished control-flow path.
#[derive(Debug)]
pub struct Abort {
    pub reason: String,
}

impl Abort {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "abort: {}", self.reason)
    }
}

impl Error for Abort {}

/// One dependency's exports, obtained through [`TaskContext::dep`].
#[derive(Debug, Clone)]
pub struct Dependency {
    exports: Exports,
}

impl Dependency {
    pub(crate) fn new(exports: Exports) -> Self {
        Self { exports }
    }

    /// Reads a named export, sharing identity with whatever `run` stored
    /// rather than cloning a fresh value out of it: every `get::<T>(name)`
    /// across one execution downcasts the same `Arc`-held allocation
    /// `Exports::set` originally boxed (spec §8, "Exported-value
    /// identity" — "every access to `t.x` returns the same object
    /// reference that `t.run` stored").
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.exports.get_value(name).cloned()?.into_arc()
    }
}

/// Callback the executor installs so a task body can materialise a
/// dependency that the static analyzer didn't put on the ready path yet
/// (spec 4.8, "execution trigger").
pub(crate) type ExecutionTrigger =
    Arc<dyn Fn(&'static TaskClass) -> Result<(), crate::error::TaskiError> + Send + Sync>;

/// Passed by reference to every `run`/`select`/`clean` call. Bundles
/// read access to already-completed dependencies with the machinery needed
/// to materialise a dependency that hasn't run yet.
pub struct TaskContext<'a> {
    pub(crate) registry: &'a crate::engine::registry::Registry,
    pub(crate) trigger: ExecutionTrigger,
    pub(crate) self_class: &'static TaskClass,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        registry: &'a crate::engine::registry::Registry,
        trigger: ExecutionTrigger,
        self_class: &'static TaskClass,
    ) -> Self {
        Self {
            registry,
            trigger,
            self_class,
        }
    }

    /// Read access to a dependency's exports, triggering it on-demand if
    /// the static schedule hasn't completed it yet (spec 4.5,
    /// `ensureCompleted`).
    pub fn dep<T: Described>(&self) -> Result<Dependency, TaskError> {
        self.dep_class(T::descriptor())
    }

    /// Same as [`TaskContext::dep`] but by descriptor, for callers that
    /// only have a `&'static TaskClass` (e.g. a section forwarding to its
    /// selected candidate).
    pub fn dep_class(&self, class: &'static TaskClass) -> Result<Dependency, TaskError> {
        let wrapper = self.registry.get_or_create(class);
        loop {
            match wrapper.run_state() {
                crate::task::state::TaskState::Completed => {
                    // A completed Section forwards to whichever candidate it
                    // selected (spec 4.7: "accesses to `section.X` forward to
                    // the selected implementation's exported value"),
                    // triggering that candidate on demand if it hasn't run.
                    if let Some(selected) = wrapper.selected_candidate() {
                        return self.dep_class(selected);
                    }
                    return Ok(Dependency::new(wrapper.exports_snapshot()));
                }
                crate::task::state::TaskState::Skipped => {
                    return Ok(Dependency::new(Exports::new()));
                }
                crate::task::state::TaskState::Failed => {
                    return Err(wrapper
                        .error()
                        .unwrap_or_else(|| TaskError::new(class, "task failed with no recorded cause")));
                }
                // Pending, Enqueued, and Running all route through the same
                // trigger: the worker pool has a fixed number of consumer
                // tasks, so a dependency that's merely Enqueued may have no
                // worker left free to pop its job off the queue (spec 4.6 —
                // reachable even with a single dependent under `_workers: 1`).
                // The trigger's `run_synchronously` claims and runs it inline
                // when nobody else has started it yet, and only falls back to
                // blocking on the condvar once the dependency is genuinely
                // Running on another worker that is actively making progress.
                crate::task::state::TaskState::Pending
                | crate::task::state::TaskState::Enqueued
                | crate::task::state::TaskState::Running => {
                    if let Err(err) = (self.trigger)(class) {
                        return Err(TaskError::new(class, err));
                    }
                }
            }
        }
    }

    pub fn args(&self) -> Arc<crate::env::Args> {
        crate::env::args()
    }

    pub fn env(&self) -> Arc<crate::env::Env> {
        crate::env::env()
    }

    pub fn self_class(&self) -> &'static TaskClass {
        self.self_class
    }
}
