//! `TaskClass`: the descriptor that stands in for Ruby's "class as
//! identifier" (Design Notes, "Class-as-identifier"). Rust has no reified
//! class objects, so a task/section is identified by a `&'static TaskClass`
//! — a name, its enclosing module path, a kind tag, the embedded source
//! text the analyzer parses, and a vtable entry to construct a fresh
//! instance.
//!
//! Every `&'static TaskClass` in a program is registered once, at the
//! `#[taski::task]`/`#[taski::section]` attribute site, via `inventory`.
//! That registry is what lets the analyzer turn a bare identifier found in
//! a task's source back into a descriptor (see `crate::analyzer::resolve`).

use std::fmt;

use crate::task::body::{SectionBody, TaskBody};

/// Distinguishes a plain [`crate::Task`] from a late-bound [`crate::Section`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Task,
    Section,
}

/// A freshly constructed task or section instance, type-erased behind the
/// kind-appropriate trait object so [`crate::task::wrapper::TaskWrapper`]
/// can invoke it uniformly.
pub enum Instance {
    Task(Box<dyn TaskBody>),
    Section(Box<dyn SectionBody>),
}

/// Static descriptor for one task or section definition.
///
/// Constructed once by the attribute macro and handed to `inventory::submit!`;
/// never constructed by hand outside macro-expanded code.
pub struct TaskClass {
    /// Simple type name, e.g. `"FetchUser"`.
    pub name: &'static str,
    /// `module_path!()` at the `impl` site, e.g. `"myapp::tasks::user"`.
    pub module_path: &'static str,
    pub kind: TaskKind,
    /// Stringified body of `run` (tasks) or `select` (sections), embedded
    /// at compile time so the analyzer never touches the filesystem.
    pub source: &'static str,
    /// Names the task declares via `exports!`/`interfaces!`.
    pub exports: &'static [&'static str],
    /// Only non-empty for sections: the statically pre-declared candidates,
    /// resolved eagerly so the DAG can be built without running `select`.
    pub candidates: &'static [fn() -> &'static TaskClass],
    pub(crate) construct: fn() -> Instance,
}

impl TaskClass {
    /// Constructs a descriptor. Only called from `#[taski::task]`/
    /// `#[taski::section]`-expanded code — the `construct` field it closes
    /// over is otherwise private to this crate.
    pub fn new(
        name: &'static str,
        module_path: &'static str,
        kind: TaskKind,
        source: &'static str,
        exports: &'static [&'static str],
        candidates: &'static [fn() -> &'static TaskClass],
        construct: fn() -> Instance,
    ) -> Self {
        Self {
            name,
            module_path,
            kind,
            source,
            exports,
            candidates,
            construct,
        }
    }

    /// Fully-qualified name used for resolution and as the graph/registry
    /// key: `module_path::name`.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.module_path, self.name)
    }
}

impl fmt::Debug for TaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskClass")
            .field("name", &self.name)
            .field("module_path", &self.module_path)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PartialEq for TaskClass {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
impl Eq for TaskClass {}

impl std::hash::Hash for TaskClass {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self as *const TaskClass).hash(state)
    }
}

/// One entry in the process-wide, macro-populated descriptor table.
pub struct TaskClassEntry {
    pub get: fn() -> &'static TaskClass,
}

inventory::collect!(TaskClassEntry);

/// Iterate every task/section descriptor known to the binary.
pub fn all_task_classes() -> impl Iterator<Item = &'static TaskClass> {
    inventory::iter::<TaskClassEntry>().map(|entry| (entry.get)())
}
