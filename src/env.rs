//! Ambient `args`/`env`, available only from inside a task body (spec 6).
//!
//! Design Notes calls for "an explicit scope wrapper that restores the
//! previous value" on every exit path. We implement that as a worker-scoped
//! thread-local slot (Design Notes' other suggested strategy) installed by
//! the pool immediately before invoking a task's body and torn down by an
//! RAII guard, so a panic unwinding out of `run` still clears it.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::task::descriptor::TaskClass;

/// User-supplied key/value configuration passed to [`crate::Executor::execute`].
///
/// Keys starting with `_` are reserved for the engine itself; the only one
/// currently recognised is `_workers`.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, val: T) -> &mut Self {
        self.values.insert(key.into(), Arc::new(val));
        self
    }

    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// The `_workers` override, if the caller set one.
    pub fn workers(&self) -> Option<usize> {
        self.get::<usize>("_workers").copied()
    }
}

/// Read-only execution metadata, available the same way `args` is.
#[derive(Debug, Clone)]
pub struct Env {
    pub working_directory: PathBuf,
    pub started_at: SystemTime,
    pub root_task: &'static TaskClass,
}

thread_local! {
    static CURRENT: RefCell<Option<(Arc<Args>, Arc<Env>)>> = RefCell::new(None);
}

/// Installs `args`/`env` for the duration of one task-body invocation on
/// the current worker thread. Dropped (even via unwind) at the end of the
/// call that invoked the body.
pub(crate) struct AmbientGuard {
    _private: (),
}

impl AmbientGuard {
    pub(crate) fn install(args: Arc<Args>, env: Arc<Env>) -> Self {
        CURRENT.with(|cell| *cell.borrow_mut() = Some((args, env)));
        Self { _private: () }
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        CURRENT.with(|cell| *cell.borrow_mut() = None);
    }
}

/// The ambient `args` for the task body currently executing on this thread.
///
/// # Panics
/// Panics if called outside a task/section body — mirrors the original's
/// `Taski.args` being valid only during `run`.
pub fn args() -> Arc<Args> {
    CURRENT.with(|cell| {
        cell.borrow()
            .as_ref()
            .expect("taski::args() called outside a task body")
            .0
            .clone()
    })
}

/// The ambient `env` for the task body currently executing on this thread.
pub fn env() -> Arc<Env> {
    CURRENT.with(|cell| {
        cell.borrow()
            .as_ref()
            .expect("taski::env() called outside a task body")
            .1
            .clone()
    })
}
