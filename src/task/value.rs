//! Type-erased storage for exported values.
//!
//! `Value` is `dagrs::task::state::Content` generalised from "a task's one
//! output" to "one named export": a task may `exports :a, :b` in the
//! original, so instead of a single `Content` per task we keep a
//! name -> `Value` map (`Exports`).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A single exported value, boxed behind `Any` so `Exports` can hold
/// heterogeneous fields. Must be `Send + Sync` because dependents may read
/// it from a different worker thread than the one that produced it.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Value {
    pub fn new<T: Send + Sync + 'static>(val: T) -> Self {
        Self {
            inner: Arc::new(val),
        }
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn into_arc<T: Send + Sync + 'static>(self) -> Option<Arc<T>> {
        self.inner.downcast::<T>().ok()
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value(..)")
    }
}

/// The set of named values a task's `run` produced, populated by
/// `TaskContext::export` calls made from inside the body.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    fields: HashMap<&'static str, Value>,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Send + Sync + 'static>(&mut self, name: &'static str, val: T) {
        self.fields.insert(name, Value::new(val));
    }

    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.fields.get(name).and_then(Value::get::<T>)
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
