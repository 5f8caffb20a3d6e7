//! Task and section definitions: descriptors, user-facing traits, the
//! state machine, and exported-value storage.

pub mod body;
pub mod descriptor;
pub mod state;
pub mod value;
pub mod wrapper;

pub use body::{Abort, Dependency, Described, SectionBody, TaskBody, TaskContext, TaskResult};
pub use descriptor::{all_task_classes, Instance, TaskClass, TaskClassEntry, TaskKind};
pub use state::{CleanState, TaskState};
pub use value::{Exports, Value};
pub use wrapper::TaskWrapper;
