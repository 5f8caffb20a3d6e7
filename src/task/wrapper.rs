//! `TaskWrapper`: the state machine around one task instance (spec 4.5).
//!
//! Exactly one `TaskWrapper` exists per `TaskClass` per execution (enforced
//! by [`crate::engine::registry::Registry`]); it is the only object that
//! ever invokes the user's `run`/`select`/`clean`, and it is the thing
//! dependents synchronise on when they need a dependency's value.

use std::sync::{Condvar, Mutex};
use std::time::Instant;

use crate::error::TaskError;
use crate::task::body::TaskContext;
use crate::task::descriptor::{Instance, TaskClass, TaskKind};
use crate::task::state::TaskState;
use crate::task::value::Exports;

struct Phase {
    state: Mutex<TaskState>,
    cv: Condvar,
}

impl Phase {
    fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Pending),
            cv: Condvar::new(),
        }
    }

    fn get(&self) -> TaskState {
        *self.state.lock().unwrap()
    }

    /// Move to `to` iff currently in one of `from`; returns whether the
    /// transition happened. Always wakes waiters so `wait_until_terminal`
    /// can't miss the update.
    fn transition(&self, from: &[TaskState], to: TaskState) -> bool {
        let mut guard = self.state.lock().unwrap();
        if from.contains(&guard) {
            *guard = to;
            self.cv.notify_all();
            true
        } else {
            false
        }
    }

    fn wait_until_terminal(&self) -> TaskState {
        let mut guard = self.state.lock().unwrap();
        while !guard.is_terminal() {
            guard = self.cv.wait(guard).unwrap();
        }
        *guard
    }
}

pub struct TaskWrapper {
    pub class: &'static TaskClass,
    instance: Mutex<Instance>,
    run: Phase,
    clean: Phase,
    exports: Mutex<Exports>,
    error: Mutex<Option<TaskError>>,
    clean_error: Mutex<Option<TaskError>>,
    /// Selected candidate, populated once for `Section` wrappers.
    selected: Mutex<Option<&'static TaskClass>>,
    duration_ms: Mutex<Option<u64>>,
    clean_duration_ms: Mutex<Option<u64>>,
}

impl TaskWrapper {
    pub fn new(class: &'static TaskClass) -> Self {
        Self {
            class,
            instance: Mutex::new((class.construct)()),
            run: Phase::new(),
            clean: Phase::new(),
            exports: Mutex::new(Exports::new()),
            error: Mutex::new(None),
            clean_error: Mutex::new(None),
            selected: Mutex::new(None),
            duration_ms: Mutex::new(None),
            clean_duration_ms: Mutex::new(None),
        }
    }

    pub fn run_state(&self) -> TaskState {
        self.run.get()
    }

    pub fn clean_state(&self) -> TaskState {
        self.clean.get()
    }

    pub fn wait_until_run_terminal(&self) -> TaskState {
        self.run.wait_until_terminal()
    }

    pub fn wait_until_clean_terminal(&self) -> TaskState {
        self.clean.wait_until_terminal()
    }

    /// Pending -> Enqueued; idempotent for Enqueued, false otherwise.
    pub fn mark_enqueued(&self) -> bool {
        if self.run.get() == TaskState::Enqueued {
            return true;
        }
        self.run.transition(&[TaskState::Pending], TaskState::Enqueued)
    }

    /// Enqueued -> Running; false if some other worker already claimed it
    /// (guards against double-enqueue, spec 4.5).
    pub fn mark_running(&self) -> bool {
        self.run.transition(&[TaskState::Enqueued], TaskState::Running)
    }

    pub fn mark_completed_exports(&self, exports: Exports) {
        *self.exports.lock().unwrap() = exports;
        self.run
            .transition(&[TaskState::Running, TaskState::Enqueued], TaskState::Completed);
    }

    pub fn mark_failed_error(&self, err: TaskError) {
        *self.error.lock().unwrap() = Some(err);
        self.run
            .transition(&[TaskState::Running, TaskState::Enqueued], TaskState::Failed);
    }

    /// A Section candidate that lost selection. Only legal from Pending.
    pub fn mark_skipped(&self) -> bool {
        self.run.transition(&[TaskState::Pending], TaskState::Skipped)
    }

    /// A Section's own wrapper has no run body: it completes immediately
    /// once a candidate is chosen (spec 4.7.1).
    pub fn mark_section_completed(&self, selected: &'static TaskClass) {
        *self.selected.lock().unwrap() = Some(selected);
        self.run.transition(
            &[TaskState::Pending, TaskState::Enqueued, TaskState::Running],
            TaskState::Completed,
        );
    }

    pub fn selected_candidate(&self) -> Option<&'static TaskClass> {
        *self.selected.lock().unwrap()
    }

    pub fn error(&self) -> Option<TaskError> {
        self.error.lock().unwrap().clone()
    }

    pub fn clean_error(&self) -> Option<TaskError> {
        self.clean_error.lock().unwrap().clone()
    }

    pub fn exports_snapshot(&self) -> Exports {
        self.exports.lock().unwrap().clone()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        *self.duration_ms.lock().unwrap()
    }

    // -- clean phase --

    pub fn mark_clean_enqueued(&self) -> bool {
        if self.clean.get() == TaskState::Enqueued {
            return true;
        }
        self.clean
            .transition(&[TaskState::Pending], TaskState::Enqueued)
    }

    pub fn mark_clean_running(&self) -> bool {
        self.clean
            .transition(&[TaskState::Enqueued], TaskState::Running)
    }

    pub fn mark_clean_completed(&self) {
        self.clean
            .transition(&[TaskState::Running, TaskState::Enqueued], TaskState::Completed);
    }

    pub fn mark_clean_failed(&self, err: TaskError) {
        *self.clean_error.lock().unwrap() = Some(err);
        self.clean
            .transition(&[TaskState::Running, TaskState::Enqueued], TaskState::Failed);
    }

    pub fn mark_clean_skipped(&self) -> bool {
        self.clean.transition(&[TaskState::Pending], TaskState::Skipped)
    }

    /// Invoke the user's `run`. Returns the raw `TaskResult` (not yet
    /// wrapped in `TaskError`) so the executor can first check whether the
    /// error is a `taski::Abort` before deciding how to record it (spec 5,
    /// 7.3). Captures wall-clock duration for observer reporting (spec 4.5).
    pub fn invoke_run(&self, ctx: &TaskContext<'_>) -> crate::task::body::TaskResult<Exports> {
        debug_assert_eq!(self.class.kind, TaskKind::Task);
        let start = Instant::now();
        let result = {
            let instance = self.instance.lock().unwrap();
            match &*instance {
                Instance::Task(task) => task.run(ctx),
                Instance::Section(_) => unreachable!("sections have no run body"),
            }
        };
        *self.duration_ms.lock().unwrap() = Some(start.elapsed().as_millis() as u64);
        result
    }

    pub fn invoke_select(&self, ctx: &TaskContext<'_>) -> crate::task::body::TaskResult<&'static TaskClass> {
        debug_assert_eq!(self.class.kind, TaskKind::Section);
        let instance = self.instance.lock().unwrap();
        match &*instance {
            Instance::Section(section) => section.select(ctx),
            Instance::Task(_) => unreachable!("only sections are selected"),
        }
    }

    pub fn invoke_clean(&self, ctx: &TaskContext<'_>) -> crate::task::body::TaskResult<()> {
        let start = Instant::now();
        let result = {
            let instance = self.instance.lock().unwrap();
            match &*instance {
                Instance::Task(task) => task.clean(ctx),
                Instance::Section(_) => Ok(()),
            }
        };
        *self.clean_duration_ms.lock().unwrap() = Some(start.elapsed().as_millis() as u64);
        result
    }

}
