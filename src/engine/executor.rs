//! `Executor`: the orchestrator — builds the graph, drives the event loop,
//! enqueues ready tasks, aggregates failures, runs the clean pass (spec
//! 4.8).

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::mpsc;

use crate::analyzer::Mode;
use crate::engine::context::ExecutionContext;
use crate::engine::graph::DependencyGraph;
use crate::engine::registry::Registry;
use crate::engine::worker_pool::{default_worker_count, WorkerPool};
use crate::env::{AmbientGuard, Args, Env};
use crate::error::{AggregateError, TaskAbortException, TaskError, TaskFailure, TaskiError};
use crate::observer::{Phase, SharedObserver};
use crate::task::body::{Abort, ExecutionTrigger, TaskContext, TaskResult};
use crate::task::descriptor::{TaskClass, TaskKind};
use crate::task::state::TaskState;
use crate::task::wrapper::TaskWrapper;

struct RunJob {
    class: &'static TaskClass,
}

struct CleanJob {
    class: &'static TaskClass,
}

/// `TASKI_DEBUG=1` (spec 6): executor-level trace lines to stderr,
/// independent of whatever level the embedding binary's own `log`
/// filter is set to.
fn debug_enabled() -> bool {
    std::env::var("TASKI_DEBUG").as_deref() == Ok("1")
}

macro_rules! taski_trace {
    ($($arg:tt)*) => {
        if debug_enabled() {
            eprintln!("[taski] {}", format!($($arg)*));
        }
    };
}

/// Owns the `Registry`, `Scheduler`, `ExecutionContext` for one
/// `execute`/`execute_clean` pair. A fresh `Executor` means a fresh
/// `Registry` — see DESIGN.md's resolution of "fresh execution" semantics.
pub struct Executor {
    registry: Arc<Registry>,
    context: Arc<ExecutionContext>,
    scheduler: Mutex<Option<Arc<crate::engine::scheduler::Scheduler>>>,
    installed_capture: Mutex<bool>,
}

impl Executor {
    pub fn new(observers: Vec<SharedObserver>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            context: Arc::new(ExecutionContext::new(observers)),
            scheduler: Mutex::new(None),
            installed_capture: Mutex::new(false),
        }
    }

    /// Installs the default observer set: none if `TASKI_PROGRESS_DISABLE=1`,
    /// otherwise a [`crate::observer::LoggingObserver`] regardless of which
    /// [`crate::observer::ProgressMode`] was requested — rendering `tree`/
    /// `simple`/`plain` displays is an external collaborator's job (spec 1).
    pub fn with_default_observers() -> Self {
        let observers: Vec<SharedObserver> = if std::env::var("TASKI_PROGRESS_DISABLE").as_deref() == Ok("1") {
            Vec::new()
        } else {
            if crate::observer::progress_mode() != crate::observer::ProgressMode::Log {
                log::debug!(
                    "TASKI_PROGRESS_MODE={:?} requested but no matching display is registered; falling back to log output",
                    crate::observer::progress_mode()
                );
            }
            vec![Arc::new(crate::observer::LoggingObserver) as SharedObserver]
        };
        Self::new(observers)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs the forward pass from `root` to completion (spec 4.8, steps
    /// 1-6 and 8).
    pub fn execute(&self, root: &'static TaskClass, args: Args) -> Result<(), TaskiError> {
        let graph = DependencyGraph::build_from(root, Mode::Execution)?;
        graph.topological_order()?;
        taski_trace!("graph built from {}: {} node(s)", root.qualified_name(), graph.len());

        let scheduler = Arc::new(crate::engine::scheduler::Scheduler::new(graph));
        for class in scheduler.graph().nodes() {
            let wrapper = self.registry.get_or_create(class);
            scheduler.register(class, wrapper);
        }
        *self.scheduler.lock().unwrap() = Some(scheduler.clone());

        self.context.notify_ready(scheduler.graph());
        *self.installed_capture.lock().unwrap() = self.context.install_capture();

        self.context.set_phase(Phase::Run);
        self.context.notify_start(scheduler.graph());

        let env = Arc::new(Env {
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            started_at: SystemTime::now(),
            root_task: root,
        });
        let args = Arc::new(args);
        let workers = args.workers().unwrap_or_else(default_worker_count);

        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<()>();
        let registry = self.registry.clone();
        let context = self.context.clone();
        let trigger = make_trigger(registry.clone(), context.clone(), args.clone(), env.clone());

        let pool: WorkerPool<RunJob> = WorkerPool::start(workers, {
            let registry = registry.clone();
            let context = context.clone();
            let trigger = trigger.clone();
            let args = args.clone();
            let env = env.clone();
            let completion_tx = completion_tx.clone();
            move |job: RunJob| {
                run_one(job.class, &registry, &context, trigger.clone(), &args, &env);
                let _ = completion_tx.send(());
            }
        });

        let rt = fresh_runtime();
        rt.block_on(async {
            enqueue_ready_run(&scheduler, &registry, &pool);

            // Loop while anything is Enqueued/Running. A task left Pending
            // forever because a prerequisite Failed (rather than Completed
            // or Skipped) never becomes ready, so root-terminal is not a
            // safe loop condition by itself — it would hang waiting on a
            // completion that will never arrive (spec 8 scenario 5).
            loop {
                if !scheduler.running_tasks() {
                    break;
                }
                match completion_rx.recv().await {
                    Some(()) => {
                        if !registry.abort_requested() {
                            enqueue_ready_run(&scheduler, &registry, &pool);
                        }
                    }
                    None => break,
                }
            }
            pool.shutdown().await;
        });

        self.context.notify_stop(scheduler.graph());
        if *self.installed_capture.lock().unwrap() {
            self.context.teardown_capture();
        }

        // Abort takes precedence over an ordinary aggregate (spec 7.3,
        // 8 scenario 6): the task that called `Abort::new` is reported as
        // the cause of the whole run, not folded into the failure list.
        if let Some(cause) = registry.abort_cause() {
            return Err(TaskiError::Abort(cause));
        }

        let failures: Vec<TaskFailure> = registry
            .failed_wrappers()
            .into_iter()
            .map(|w| TaskFailure {
                task_class: w.class,
                error: w.error().unwrap_or_else(|| TaskError::new(w.class, "task failed")),
            })
            .collect();

        if !failures.is_empty() {
            return Err(TaskiError::Aggregate(AggregateError { failures }));
        }

        Ok(())
    }

    /// Mirror protocol over the reverse graph: only tasks whose run
    /// wrapper reached Completed are visited, in reverse topological
    /// order (spec 4.8 step 7).
    pub fn execute_clean(&self, root: &'static TaskClass) -> Result<(), TaskiError> {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap()
            .clone()
            .expect("execute_clean called before execute");

        self.context.set_phase(Phase::Clean);
        self.context.notify_start(scheduler.reverse_graph());

        let completed: HashSet<&'static TaskClass> = scheduler
            .graph()
            .nodes()
            .filter(|&c| {
                self.registry
                    .get(c)
                    .map(|w| w.run_state() == TaskState::Completed)
                    .unwrap_or(false)
            })
            .collect();

        // A task that never ran has nothing to tear down; mark it Skipped
        // in the clean phase too, up front, so it never blocks its
        // dependents' readiness check.
        for class in scheduler.graph().nodes() {
            if !completed.contains(&class) {
                if let Some(wrapper) = self.registry.get(class) {
                    wrapper.mark_clean_skipped();
                }
            }
        }

        let workers = default_worker_count();
        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<()>();
        let registry = self.registry.clone();
        let context = self.context.clone();

        let pool: WorkerPool<CleanJob> = WorkerPool::start(workers, {
            let registry = registry.clone();
            let context = context.clone();
            let completion_tx = completion_tx.clone();
            move |job: CleanJob| {
                clean_one(job.class, &registry, &context);
                let _ = completion_tx.send(());
            }
        });

        let rt = fresh_runtime();
        rt.block_on(async {
            enqueue_ready_clean(&scheduler, &registry, &pool);

            loop {
                let pending = scheduler
                    .graph()
                    .nodes()
                    .any(|c| registry.get(c).map(|w| !w.clean_state().is_terminal()).unwrap_or(false));
                if !pending {
                    break;
                }
                match completion_rx.recv().await {
                    Some(()) => enqueue_ready_clean(&scheduler, &registry, &pool),
                    None => break,
                }
            }
            pool.shutdown().await;
        });

        self.context.notify_stop(scheduler.reverse_graph());

        let failures: Vec<TaskFailure> = registry
            .all_wrappers()
            .into_iter()
            .filter(|w| w.clean_state() == TaskState::Failed)
            .map(|w| TaskFailure {
                task_class: w.class,
                error: w.clean_error().unwrap_or_else(|| TaskError::new(w.class, "clean failed")),
            })
            .collect();

        if !failures.is_empty() {
            return Err(TaskiError::Aggregate(AggregateError { failures }));
        }

        Ok(())
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if *self.installed_capture.lock().unwrap() {
            self.context.teardown_capture();
        }
    }
}

fn fresh_runtime() -> tokio::runtime::Runtime {
    // A fresh current-thread-plus-workers runtime per call, generalising
    // `dagrs::Dag::start`'s own `Runtime::new().unwrap().block_on(...)` to a
    // multi-threaded one so the pool's workers run concurrently.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start tokio runtime")
}

fn enqueue_ready_run(
    scheduler: &crate::engine::scheduler::Scheduler,
    registry: &Arc<Registry>,
    pool: &WorkerPool<RunJob>,
) {
    for class in scheduler.next_ready_tasks() {
        let wrapper = registry.get_or_create(class);
        if wrapper.mark_enqueued() {
            taski_trace!("enqueue run: {}", class.qualified_name());
            pool.enqueue(RunJob { class });
        }
    }
}

fn enqueue_ready_clean(
    scheduler: &crate::engine::scheduler::Scheduler,
    registry: &Arc<Registry>,
    pool: &WorkerPool<CleanJob>,
) {
    for class in scheduler.next_ready_clean_tasks() {
        if let Some(wrapper) = registry.get(class) {
            if wrapper.mark_clean_enqueued() {
                taski_trace!("enqueue clean: {}", class.qualified_name());
                pool.enqueue(CleanJob { class });
            }
        }
    }
}

/// The callback a `TaskContext::dep` consults when the dependency it wants
/// is still Pending (spec 4.8, "execution trigger"): it runs that
/// dependency (and whatever of *its* statically-declared dependencies are
/// also still Pending) synchronously on the calling worker thread.
fn make_trigger(
    registry: Arc<Registry>,
    context: Arc<ExecutionContext>,
    args: Arc<Args>,
    env: Arc<Env>,
) -> ExecutionTrigger {
    Arc::new(move |class: &'static TaskClass| -> Result<(), TaskiError> {
        run_synchronously(class, &registry, &context, &args, &env);
        Ok(())
    })
}

/// Materialises one task on the calling thread: waits out a task that's
/// already enqueued/running elsewhere, otherwise claims it, recursively
/// materialises its own statically-declared dependencies, then runs it.
fn run_synchronously(
    class: &'static TaskClass,
    registry: &Arc<Registry>,
    context: &Arc<ExecutionContext>,
    args: &Arc<Args>,
    env: &Arc<Env>,
) {
    let wrapper = registry.get_or_create(class);
    if wrapper.run_state().is_terminal() {
        return;
    }
    if !wrapper.mark_enqueued() || !wrapper.mark_running() {
        wrapper.wait_until_run_terminal();
        return;
    }

    if let Ok(deps) = crate::analyzer::dependencies_of(class, Mode::Execution) {
        for dep in deps {
            run_synchronously(dep, registry, context, args, env);
        }
    }

    let trigger = make_trigger(registry.clone(), context.clone(), args.clone(), env.clone());
    complete_task(class, &wrapper, registry, context, trigger, args, env);
}

fn run_one(
    class: &'static TaskClass,
    registry: &Arc<Registry>,
    context: &Arc<ExecutionContext>,
    trigger: ExecutionTrigger,
    args: &Arc<Args>,
    env: &Arc<Env>,
) {
    let wrapper = registry.get_or_create(class);
    if !wrapper.mark_running() {
        return;
    }
    complete_task(class, &wrapper, registry, context, trigger, args, env);
}

/// Invokes one task/section's body and records the outcome. Shared by the
/// pool's ordinary scheduled path and the on-demand trigger path.
fn complete_task(
    class: &'static TaskClass,
    wrapper: &Arc<TaskWrapper>,
    registry: &Arc<Registry>,
    context: &Arc<ExecutionContext>,
    trigger: ExecutionTrigger,
    args: &Arc<Args>,
    env: &Arc<Env>,
) {
    let _capture_guard = context.begin_task_capture(class);
    let ambient = AmbientGuard::install(args.clone(), env.clone());
    let ctx = TaskContext::new(registry, trigger, class);

    match class.kind {
        TaskKind::Task => {
            let result: TaskResult<_> = wrapper.invoke_run(&ctx);
            drop(ambient);
            match result {
                Ok(exports) => {
                    wrapper.mark_completed_exports(exports);
                    context.notify_task_updated(class, TaskState::Running, TaskState::Completed, None);
                }
                Err(err) => {
                    let abort = err.downcast_ref::<Abort>().map(|a| TaskAbortException::new(class, &a.reason));
                    let task_err = TaskError::new(class, err);
                    context.notify_task_updated(class, TaskState::Running, TaskState::Failed, Some(&task_err));
                    wrapper.mark_failed_error(task_err);
                    if let Some(abort) = abort {
                        registry.request_abort(abort);
                    }
                }
            }
        }
        TaskKind::Section => {
            let result = wrapper.invoke_select(&ctx);
            drop(ambient);
            match result {
                Ok(selected) => {
                    for get_candidate in class.candidates {
                        let candidate = get_candidate();
                        if !std::ptr::eq(candidate, selected) {
                            let candidate_wrapper = registry.get_or_create(candidate);
                            if candidate_wrapper.mark_skipped() {
                                context.notify_task_updated(candidate, TaskState::Pending, TaskState::Skipped, None);
                            }
                        }
                    }
                    wrapper.mark_section_completed(selected);
                    context.notify_task_updated(class, TaskState::Running, TaskState::Completed, None);
                }
                Err(err) => {
                    // A failed selector leaves every candidate Pending
                    // (spec 4.7: "all candidates remain Pending until
                    // pruned as Skipped at end-of-run") — none of them
                    // depend on anything but this section, so none can
                    // become ready while it's Failed rather than
                    // Completed/Skipped (spec 4.3's readiness rule).
                    let abort = err.downcast_ref::<Abort>().map(|a| TaskAbortException::new(class, &a.reason));
                    let task_err = TaskError::new(class, err);
                    context.notify_task_updated(class, TaskState::Running, TaskState::Failed, Some(&task_err));
                    wrapper.mark_failed_error(task_err);
                    if let Some(abort) = abort {
                        registry.request_abort(abort);
                    }
                }
            }
        }
    }
}

fn clean_one(class: &'static TaskClass, registry: &Arc<Registry>, context: &Arc<ExecutionContext>) {
    let wrapper = registry.get_or_create(class);
    if !wrapper.mark_clean_running() {
        return;
    }
    // Clean bodies tear down what `run` built; they don't read fresh
    // dependencies, so the trigger here is a no-op stub rather than the
    // real materialising one.
    let trigger: ExecutionTrigger = Arc::new(|_| Ok(()));
    let ctx = TaskContext::new(registry, trigger, class);
    match wrapper.invoke_clean(&ctx) {
        Ok(()) => {
            wrapper.mark_clean_completed();
            context.notify_task_updated(class, TaskState::Running, TaskState::Completed, None);
        }
        Err(err) => {
            let task_err = TaskError::new(class, err);
            context.notify_task_updated(class, TaskState::Running, TaskState::Failed, Some(&task_err));
            wrapper.mark_clean_failed(task_err);
        }
    }
}
