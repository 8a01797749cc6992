//! Named, nestable batches. A batch only brackets events; it never defers them.

use std::ops::{Deref, DerefMut};

use crate::event::GraphEvent;
use crate::graph::Graph;

/// Keeps a batch open until dropped.
pub struct BatchGuard<'a> {
    graph: &'a mut Graph,
    name: String,
}

impl Deref for BatchGuard<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        self.graph
    }
}

impl DerefMut for BatchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        self.graph
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let name = std::mem::take(&mut self.name);
        self.graph.stop_batch(&name);
    }
}

impl Graph {
    pub fn start_batch(&mut self, name: &str) {
        *self.batches.entry(name.to_string()).or_insert(0) += 1;
        tracing::debug!(batch = name, "batch start");
        self.emit(GraphEvent::BatchStart {
            name: name.to_string(),
        });
    }

    /// Closes one level of `name`. Unbalanced stops are ignored apart from the event.
    pub fn stop_batch(&mut self, name: &str) {
        if let Some(count) = self.batches.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.batches.remove(name);
            }
        }
        tracing::debug!(batch = name, "batch stop");
        self.emit(GraphEvent::BatchStop {
            name: name.to_string(),
        });
    }

    /// Opens `name` until the returned guard is dropped.
    pub fn batch(&mut self, name: &str) -> BatchGuard<'_> {
        self.start_batch(name);
        BatchGuard {
            graph: self,
            name: name.to_string(),
        }
    }

    pub fn with_batch<R>(&mut self, name: &str, f: impl FnOnce(&mut Graph) -> R) -> R {
        let mut guard = self.batch(name);
        f(&mut guard)
    }

    /// Whether `name` (or, with `None`, any batch) is open.
    pub fn has_active_batch(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.batches.get(name).is_some_and(|c| *c > 0),
            None => self.batches.values().any(|c| *c > 0),
        }
    }
}
