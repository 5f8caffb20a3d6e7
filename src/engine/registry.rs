//! `Registry`: the process-scoped (per execution) table mapping a task
//! class to its single `TaskWrapper` (spec 4.4). Enforces singleton-per-run
//! semantics, which is what lets dependents observe the identical exported
//! values no matter how many of them read the same dependency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TaskAbortException;
use crate::task::descriptor::TaskClass;
use crate::task::wrapper::TaskWrapper;

#[derive(Default)]
pub struct Registry {
    wrappers: Mutex<HashMap<&'static TaskClass, Arc<TaskWrapper>>>,
    abort: AtomicBool,
    abort_cause: Mutex<Option<TaskAbortException>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-insert. Returns the existing wrapper if one was
    /// already created for `class` in this run.
    pub fn get_or_create(&self, class: &'static TaskClass) -> Arc<TaskWrapper> {
        let mut wrappers = self.wrappers.lock().unwrap();
        wrappers
            .entry(class)
            .or_insert_with(|| Arc::new(TaskWrapper::new(class)))
            .clone()
    }

    pub fn get(&self, class: &'static TaskClass) -> Option<Arc<TaskWrapper>> {
        self.wrappers.lock().unwrap().get(class).cloned()
    }

    /// Records the first abort request this run sees; later callers lose
    /// the race and their cause is discarded (only one task's `Abort` is
    /// surfaced, spec 7.3).
    pub fn request_abort(&self, cause: TaskAbortException) {
        let mut guard = self.abort_cause.lock().unwrap();
        if guard.is_none() {
            *guard = Some(cause);
        }
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    pub fn abort_cause(&self) -> Option<TaskAbortException> {
        self.abort_cause.lock().unwrap().clone()
    }

    /// Snapshot of every wrapper currently in a Failed state.
    pub fn failed_wrappers(&self) -> Vec<Arc<TaskWrapper>> {
        self.wrappers
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.run_state() == crate::task::state::TaskState::Failed)
            .cloned()
            .collect()
    }

    pub fn all_wrappers(&self) -> Vec<Arc<TaskWrapper>> {
        self.wrappers.lock().unwrap().values().cloned().collect()
    }
}
