//! `ExecutionContext`: observer fan-out and stdout capture, the sole
//! bridge between the core and the external collaborators (spec 3, 5).

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::engine::graph::DependencyGraph;
use crate::error::TaskError;
use crate::observer::{GraphView, Phase, SharedObserver};
use crate::task::descriptor::TaskClass;
use crate::task::state::TaskState;

thread_local! {
    static ACTIVE_TASK_BUFFER: RefCell<Option<Arc<Mutex<String>>>> = RefCell::new(None);
}

pub struct ExecutionContext {
    observers: Vec<SharedObserver>,
    phase: Mutex<Phase>,
    capture: Mutex<Option<gag::BufferRedirect>>,
    task_buffers: Mutex<HashMap<&'static TaskClass, Arc<Mutex<String>>>>,
}

impl ExecutionContext {
    pub fn new(observers: Vec<SharedObserver>) -> Self {
        Self {
            observers,
            phase: Mutex::new(Phase::Run),
            capture: Mutex::new(None),
            task_buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_phase(&self, phase: Phase) {
        *self.phase.lock().unwrap() = phase;
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap()
    }

    pub fn notify_ready(&self, graph: &DependencyGraph) {
        let view = GraphView::new(graph, self.phase());
        for observer in &self.observers {
            observer.on_ready(&view);
        }
    }

    pub fn notify_start(&self, graph: &DependencyGraph) {
        let view = GraphView::new(graph, self.phase());
        for observer in &self.observers {
            observer.on_start(&view);
        }
    }

    pub fn notify_stop(&self, graph: &DependencyGraph) {
        let view = GraphView::new(graph, self.phase());
        for observer in &self.observers {
            observer.on_stop(&view);
        }
    }

    pub fn notify_task_updated(
        &self,
        task: &'static TaskClass,
        previous: TaskState,
        current: TaskState,
        error: Option<&TaskError>,
    ) {
        let timestamp = SystemTime::now();
        for observer in &self.observers {
            observer.on_task_updated(task, previous, current, timestamp, error);
        }
    }

    /// Installs the process-wide stdout redirect if one isn't already
    /// active; returns whether *this* call installed it, so the caller
    /// can symmetrically tear it down at exit (spec 4.8 step 3/7).
    pub fn install_capture(&self) -> bool {
        let mut guard = self.capture.lock().unwrap();
        if guard.is_some() {
            return false;
        }
        match gag::BufferRedirect::stdout() {
            Ok(redirect) => {
                *guard = Some(redirect);
                true
            }
            Err(err) => {
                log::warn!("could not install stdout capture: {err}");
                false
            }
        }
    }

    pub fn teardown_capture(&self) {
        self.capture.lock().unwrap().take();
    }

    /// Marks the calling worker thread as currently running `task` for
    /// the duration of the returned guard (spec 5: "each worker sets a
    /// thread-local marker so emitted lines are routed to the right
    /// task's buffer").
    pub fn begin_task_capture<'a>(&'a self, task: &'static TaskClass) -> TaskCaptureGuard<'a> {
        let buffer = self
            .task_buffers
            .lock()
            .unwrap()
            .entry(task)
            .or_insert_with(|| Arc::new(Mutex::new(String::new())))
            .clone();
        ACTIVE_TASK_BUFFER.with(|cell| *cell.borrow_mut() = Some(buffer));
        TaskCaptureGuard { context: self }
    }

    pub fn captured_output(&self, task: &'static TaskClass) -> String {
        self.task_buffers
            .lock()
            .unwrap()
            .get(task)
            .map(|buf| buf.lock().unwrap().clone())
            .unwrap_or_default()
    }

    /// Drains whatever the shared redirect has accumulated into whichever
    /// task buffer is marked active on this thread. The redirect is one
    /// process-wide pipe shared by every worker, so output from two tasks
    /// printing concurrently can interleave; this is a best-effort
    /// attribution, not a guarantee (see DESIGN.md).
    fn drain_into_active_buffer(&self) {
        let mut guard = self.capture.lock().unwrap();
        if let Some(redirect) = guard.as_mut() {
            let mut captured = String::new();
            let _ = redirect.read_to_string(&mut captured);
            if !captured.is_empty() {
                ACTIVE_TASK_BUFFER.with(|cell| {
                    if let Some(buffer) = cell.borrow().as_ref() {
                        buffer.lock().unwrap().push_str(&captured);
                    }
                });
            }
        }
    }
}

pub struct TaskCaptureGuard<'a> {
    context: &'a ExecutionContext,
}

impl<'a> Drop for TaskCaptureGuard<'a> {
    fn drop(&mut self) {
        self.context.drain_into_active_buffer();
        ACTIVE_TASK_BUFFER.with(|cell| *cell.borrow_mut() = None);
    }
}
