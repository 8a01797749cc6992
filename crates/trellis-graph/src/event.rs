//! Graph-level events and listener bookkeeping.
//!
//! Listeners receive `&mut Graph`, so they may mutate the graph. Events raised meanwhile are
//! queued and delivered in order once the current event has reached every listener.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::cell::{CellId, CellRole, ChangeOptions};
use crate::graph::Graph;

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    Add {
        id: CellId,
        role: CellRole,
        options: ChangeOptions,
    },
    Remove {
        id: CellId,
        role: CellRole,
        options: ChangeOptions,
    },
    Change {
        id: CellId,
        role: CellRole,
        key: String,
        previous: Option<Value>,
        options: ChangeOptions,
    },
    /// The whole cell collection was replaced.
    Reset { options: ChangeOptions },
    /// The z order of existing cells changed.
    Sort,
    BatchStart { name: String },
    BatchStop { name: String },
}

impl GraphEvent {
    /// The cell this event is about, if any.
    pub fn cell_id(&self) -> Option<&CellId> {
        match self {
            GraphEvent::Add { id, .. }
            | GraphEvent::Remove { id, .. }
            | GraphEvent::Change { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<CellRole> {
        match self {
            GraphEvent::Add { role, .. }
            | GraphEvent::Remove { role, .. }
            | GraphEvent::Change { role, .. } => Some(*role),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type Listener = Rc<RefCell<dyn FnMut(&mut Graph, &GraphEvent)>>;

#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    list: Vec<(ListenerId, Listener)>,
    queue: VecDeque<GraphEvent>,
    dispatching: bool,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.list.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.list.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.list.len();
        self.list.retain(|(lid, _)| *lid != id);
        before != self.list.len()
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.list.iter().any(|(lid, _)| *lid == id)
    }
}

impl Graph {
    /// Registers a listener for every graph event.
    pub fn on(&mut self, listener: impl FnMut(&mut Graph, &GraphEvent) + 'static) -> ListenerId {
        self.listeners.add(Rc::new(RefCell::new(listener)))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.listeners.queue.push_back(event);
        if self.listeners.dispatching {
            return;
        }
        self.listeners.dispatching = true;
        while let Some(event) = self.listeners.queue.pop_front() {
            tracing::trace!(?event, "dispatching graph event");
            let snapshot: Vec<(ListenerId, Listener)> = self.listeners.list.clone();
            for (id, listener) in snapshot {
                // Listeners removed by an earlier listener of the same event are skipped.
                if !self.listeners.contains(id) {
                    continue;
                }
                let Ok(mut f) = listener.try_borrow_mut() else {
                    continue;
                };
                f(self, &event);
            }
        }
        self.listeners.dispatching = false;
    }
}
