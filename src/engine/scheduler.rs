//! `Scheduler`: wraps the graph with per-task execution states and two
//! readiness queues — one for the forward run pass, one for the reverse
//! clean pass (spec 4.3).

use std::collections::HashSet;
use std::sync::Mutex;

use crate::engine::graph::DependencyGraph;
use crate::task::descriptor::TaskClass;
use crate::task::wrapper::TaskWrapper;

pub struct Scheduler {
    graph: DependencyGraph,
    reverse_graph: DependencyGraph,
    /// Registered so `next_ready_tasks` can consult a wrapper's run/clean
    /// state directly rather than duplicating a parallel state map — the
    /// wrapper already owns its `Mutex<TaskState>` (spec 3: "Scheduler
    /// state maps ... guarded by the same or a sibling mutex").
    wrappers: Mutex<Vec<(&'static TaskClass, std::sync::Arc<TaskWrapper>)>>,
}

impl Scheduler {
    pub fn new(graph: DependencyGraph) -> Self {
        let reverse_graph = graph.reversed();
        Self {
            graph,
            reverse_graph,
            wrappers: Mutex::new(Vec::new()),
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn register(&self, class: &'static TaskClass, wrapper: std::sync::Arc<TaskWrapper>) {
        self.wrappers.lock().unwrap().push((class, wrapper));
    }

    fn wrapper_of(&self, class: &'static TaskClass) -> Option<std::sync::Arc<TaskWrapper>> {
        self.wrappers
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, w)| w.clone())
    }

    /// Every Pending task whose every prerequisite is Completed or Skipped.
    pub fn next_ready_tasks(&self) -> Vec<&'static TaskClass> {
        let wrappers = self.wrappers.lock().unwrap();
        wrappers
            .iter()
            .filter(|(class, wrapper)| {
                wrapper.run_state() == crate::task::state::TaskState::Pending
                    && self.dependencies_satisfied(class)
            })
            .map(|(class, _)| *class)
            .collect()
    }

    fn dependencies_satisfied(&self, class: &'static TaskClass) -> bool {
        self.graph.dependencies_for(class).iter().all(|dep| {
            self.wrapper_of(dep)
                .map(|w| {
                    matches!(
                        w.run_state(),
                        crate::task::state::TaskState::Completed | crate::task::state::TaskState::Skipped
                    )
                })
                .unwrap_or(false)
        })
    }

    /// Mirror of `next_ready_tasks` for the clean pass: a task is ready to
    /// clean once every *dependent* of it has finished cleaning (clean
    /// runs in reverse topological order).
    pub fn next_ready_clean_tasks(&self) -> Vec<&'static TaskClass> {
        let wrappers = self.wrappers.lock().unwrap();
        wrappers
            .iter()
            .filter(|(class, wrapper)| {
                wrapper.clean_state() == crate::task::state::TaskState::Pending
                    && self.dependents_done_cleaning(class)
            })
            .map(|(class, _)| *class)
            .collect()
    }

    fn dependents_done_cleaning(&self, class: &'static TaskClass) -> bool {
        self.graph.dependents_for(class).iter().all(|dependent| {
            self.wrapper_of(dependent)
                .map(|w| w.clean_state().is_terminal())
                .unwrap_or(true)
        })
    }

    pub fn running_tasks(&self) -> bool {
        self.wrappers
            .lock()
            .unwrap()
            .iter()
            .any(|(_, w)| w.run_state().is_running())
    }

    pub fn running_clean_tasks(&self) -> bool {
        self.wrappers
            .lock()
            .unwrap()
            .iter()
            .any(|(_, w)| w.clean_state().is_running())
    }

    /// The set of tasks left Pending at shutdown, used to notify
    /// observers which tasks never ran (spec 4.3).
    pub fn skipped_task_classes(&self) -> HashSet<&'static TaskClass> {
        self.wrappers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, w)| w.run_state() == crate::task::state::TaskState::Pending)
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn reverse_graph(&self) -> &DependencyGraph {
        &self.reverse_graph
    }
}
