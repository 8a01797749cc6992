//! The graph store: dirty tracking, frame coalescing, subscriber sets and controlled mode.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use rustc_hash::FxBuildHasher;
use trellis_graph::{CellId, CellRole, ChangeOptions, Graph, GraphEvent, ListenerId};

use crate::error::Result;
use crate::frame::FrameScheduler;
use crate::snapshot::{GraphSnapshot, GraphState};

type HashSet<K> = hashbrown::HashSet<K, FxBuildHasher>;

/// Which records a subscriber cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Elements,
    Links,
    /// Every publication.
    Any,
}

/// Argument of [`GraphStore::set_state`].
pub enum Update {
    Value(GraphState),
    With(Box<dyn FnOnce(&GraphState) -> GraphState>),
}

impl Update {
    pub fn with(f: impl FnOnce(&GraphState) -> GraphState + 'static) -> Self {
        Update::With(Box::new(f))
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Value(state) => f.debug_tuple("Value").field(state).finish(),
            Update::With(_) => f.write_str("With(..)"),
        }
    }
}

#[derive(Default)]
pub struct StoreOptions {
    /// Publish synchronously on every change made outside a batch, without waiting for a frame.
    pub realtime: bool,
    /// Called with the new state whenever a change made on the graph is published. Makes the
    /// store controlled: the host keeps the state and feeds it back through `set_state`.
    pub on_change: Option<Box<dyn FnMut(&GraphState)>>,
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("realtime", &self.realtime)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

type Callback = Rc<RefCell<dyn FnMut(&Arc<GraphSnapshot>)>>;

#[derive(Default)]
struct Subscribers {
    next: u64,
    entries: Vec<(u64, Topic, Callback)>,
}

/// Who caused a publication. Only graph changes are reported to `on_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Graph,
    State,
}

struct Tracker {
    dirty: HashSet<CellId>,
    elements: bool,
    links: bool,
    /// Every record must be rebuilt.
    all: bool,
    scheduled: bool,
    /// `set_state` is applying a state; changes are published by it, not by the listener.
    syncing: bool,
    realtime: bool,
    scheduler: Box<dyn FrameScheduler>,
    snapshot: Arc<GraphSnapshot>,
}

impl Tracker {
    fn has_pending(&self) -> bool {
        self.elements || self.links || self.all
    }

    /// Records one graph event. Returns whether it changed any record.
    fn record(&mut self, event: &GraphEvent) -> bool {
        match event {
            GraphEvent::Add { id, role, .. }
            | GraphEvent::Remove { id, role, .. }
            | GraphEvent::Change { id, role, .. } => {
                tracing::trace!(%id, ?role, "store marks cell dirty");
                self.dirty.insert(id.clone());
                match role {
                    CellRole::Element => self.elements = true,
                    CellRole::Link => self.links = true,
                }
                true
            }
            GraphEvent::Reset { .. } => {
                self.all = true;
                true
            }
            GraphEvent::Sort => {
                self.elements = true;
                self.links = true;
                true
            }
            GraphEvent::BatchStart { .. } | GraphEvent::BatchStop { .. } => false,
        }
    }
}

struct Inner {
    tracker: RefCell<Tracker>,
    subscribers: RefCell<Subscribers>,
    on_change: RefCell<Option<Box<dyn FnMut(&GraphState)>>>,
}

impl Inner {
    fn on_event(&self, graph: &Graph, event: &GraphEvent) {
        let mut tracker = self.tracker.borrow_mut();
        let changed = tracker.record(event);
        let settled = !graph.has_active_batch(None);
        let closing = matches!(event, GraphEvent::BatchStop { .. });
        if tracker.syncing || !settled || !(changed || closing) || !tracker.has_pending() {
            return;
        }
        if tracker.realtime {
            drop(tracker);
            self.publish(graph, Origin::Graph);
        } else if !tracker.scheduled {
            tracker.scheduled = true;
            tracing::trace!("store requests a frame");
            tracker.scheduler.request_frame();
        }
    }

    /// Publishes a snapshot if anything changed, then notifies. Returns whether it published.
    fn publish(&self, graph: &Graph, origin: Origin) -> bool {
        let (snapshot, elements, links) = {
            let mut tracker = self.tracker.borrow_mut();
            if !tracker.has_pending() {
                return false;
            }
            let version = tracker.snapshot.version() + 1;
            let dirty = std::mem::take(&mut tracker.dirty);
            let all = std::mem::take(&mut tracker.all);
            let snapshot = Arc::new(GraphSnapshot::rebuild(
                graph,
                version,
                &tracker.snapshot,
                (!all).then_some(&dirty),
            ));
            let elements = std::mem::take(&mut tracker.elements) || all;
            let links = std::mem::take(&mut tracker.links) || all;
            tracker.snapshot = Arc::clone(&snapshot);
            (snapshot, elements, links)
        };
        tracing::debug!(
            version = snapshot.version(),
            elements = snapshot.elements().len(),
            links = snapshot.links().len(),
            "store published a snapshot"
        );

        if origin == Origin::Graph {
            // Taken out while it runs so it may not re-enter.
            let callback = self.on_change.borrow_mut().take();
            if let Some(mut callback) = callback {
                callback(&snapshot.to_state());
                let mut slot = self.on_change.borrow_mut();
                if slot.is_none() {
                    *slot = Some(callback);
                }
            }
        }

        let callbacks: Vec<Callback> = self
            .subscribers
            .borrow()
            .entries
            .iter()
            .filter(|(_, topic, _)| match topic {
                Topic::Elements => elements,
                Topic::Links => links,
                Topic::Any => true,
            })
            .map(|(_, _, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            let mut callback = callback.borrow_mut();
            (&mut *callback)(&snapshot);
        }
        true
    }
}

/// Handle returned by [`GraphStore::subscribe`]. Dropping it keeps the subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Returns `false` when already unsubscribed or when the store is gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut subscribers = inner.subscribers.borrow_mut();
        let before = subscribers.entries.len();
        subscribers.entries.retain(|(id, _, _)| *id != self.id);
        subscribers.entries.len() != before
    }
}

/// Owns a graph and publishes snapshots of it.
pub struct GraphStore {
    graph: Graph,
    inner: Rc<Inner>,
    listener: ListenerId,
}

impl fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphStore")
            .field("graph", &self.graph.id())
            .field("version", &self.snapshot().version())
            .finish()
    }
}

impl GraphStore {
    pub fn new(
        mut graph: Graph,
        scheduler: impl FrameScheduler + 'static,
        options: StoreOptions,
    ) -> Self {
        let inner = Rc::new(Inner {
            tracker: RefCell::new(Tracker {
                dirty: HashSet::default(),
                elements: false,
                links: false,
                all: false,
                scheduled: false,
                syncing: false,
                realtime: options.realtime,
                scheduler: Box::new(scheduler),
                snapshot: Arc::new(GraphSnapshot::capture(&graph, 0)),
            }),
            subscribers: RefCell::new(Subscribers::default()),
            on_change: RefCell::new(options.on_change),
        });
        let weak = Rc::downgrade(&inner);
        let listener = graph.on(move |graph, event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_event(graph, event);
            }
        });
        Self {
            graph,
            inner,
            listener,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Direct access. Changes are tracked through the graph's events.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Runs `f` inside one batch, so its changes are published together.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut Graph) -> R) -> R {
        self.graph.with_batch("store-update", f)
    }

    /// Releases the graph. Pending changes are dropped.
    pub fn into_graph(mut self) -> Graph {
        self.graph.off(self.listener);
        self.graph
    }

    /// The current snapshot. The same `Arc` is returned until a change is published.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.inner.tracker.borrow().snapshot)
    }

    pub fn subscribe(
        &self,
        topic: Topic,
        callback: impl FnMut(&Arc<GraphSnapshot>) + 'static,
    ) -> Subscription {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        subscribers.next += 1;
        let id = subscribers.next;
        let callback: Callback = Rc::new(RefCell::new(callback));
        subscribers.entries.push((id, topic, callback));
        Subscription {
            id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether changes are waiting for a flush.
    pub fn has_pending(&self) -> bool {
        self.inner.tracker.borrow().has_pending()
    }

    /// The frame callback: publishes pending changes as one snapshot and notifies each affected
    /// topic once. Returns whether a snapshot was published.
    pub fn flush(&mut self) -> bool {
        self.inner.tracker.borrow_mut().scheduled = false;
        if self.graph.has_active_batch(None) {
            tracing::debug!("flush skipped: a batch is open");
            return false;
        }
        self.inner.publish(&self.graph, Origin::Graph)
    }

    /// Applies a state held by the host.
    ///
    /// Pending graph changes are flushed first. A state deeply equal to the current snapshot is
    /// ignored. Otherwise the graph is synchronized to it (cells missing from it are removed)
    /// and the result is published at once, without calling `on_change`. Returns whether the
    /// graph was touched. A rejected state leaves the graph and the snapshot as they were.
    pub fn set_state(&mut self, update: Update) -> Result<bool> {
        self.flush();
        let current = self.snapshot();
        let state = match update {
            Update::Value(state) => state,
            Update::With(f) => f(&current.to_state()),
        };
        if current.matches(&state) {
            tracing::trace!("state unchanged");
            return Ok(false);
        }

        self.inner.tracker.borrow_mut().syncing = true;
        let cells = state.to_cells_json();
        let result = self.graph.with_batch("sync-state", |graph| {
            graph.sync_cells(&cells, true, &ChangeOptions::new())
        });
        self.inner.tracker.borrow_mut().syncing = false;
        result?;
        self.inner.publish(&self.graph, Origin::State);
        Ok(true)
    }
}
