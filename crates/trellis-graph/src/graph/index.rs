//! Incrementally maintained adjacency of links to the cells they attach to.
//!
//! Dangling ends (ids not present in the graph) are indexed under their id like any other.

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::cell::{Cell, CellId};

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type IdSet = IndexSet<CellId, FxBuildHasher>;

#[derive(Debug, Clone, Default)]
pub(crate) struct Topology {
    out: HashMap<CellId, IdSet>,
    in_: HashMap<CellId, IdSet>,
    /// link -> (source id, target id)
    ends: HashMap<CellId, (Option<CellId>, Option<CellId>)>,
}

impl Topology {
    pub(crate) fn add(&mut self, cell: &Cell) {
        if !cell.is_link() {
            return;
        }
        let source = cell.source().and_then(|e| e.id()).cloned();
        let target = cell.target().and_then(|e| e.id()).cloned();
        if let Some(s) = &source {
            self.out
                .entry(s.clone())
                .or_default()
                .insert(cell.id().clone());
        }
        if let Some(t) = &target {
            self.in_
                .entry(t.clone())
                .or_default()
                .insert(cell.id().clone());
        }
        self.ends.insert(cell.id().clone(), (source, target));
    }

    pub(crate) fn remove(&mut self, link: &CellId) {
        let Some((source, target)) = self.ends.remove(link) else {
            return;
        };
        if let Some(s) = source {
            remove_from(&mut self.out, &s, link);
        }
        if let Some(t) = target {
            remove_from(&mut self.in_, &t, link);
        }
    }

    /// Re-indexes a link after its ends changed.
    pub(crate) fn update(&mut self, cell: &Cell) {
        self.remove(cell.id());
        self.add(cell);
    }

    pub(crate) fn outbound(&self, id: &str) -> impl Iterator<Item = &CellId> {
        self.out.get(id).into_iter().flatten()
    }

    pub(crate) fn inbound(&self, id: &str) -> impl Iterator<Item = &CellId> {
        self.in_.get(id).into_iter().flatten()
    }

    pub(crate) fn has_outbound(&self, id: &str) -> bool {
        self.out.get(id).is_some_and(|s| !s.is_empty())
    }

    pub(crate) fn has_inbound(&self, id: &str) -> bool {
        self.in_.get(id).is_some_and(|s| !s.is_empty())
    }

    pub(crate) fn ends(&self, link: &str) -> Option<&(Option<CellId>, Option<CellId>)> {
        self.ends.get(link)
    }
}

fn remove_from(map: &mut HashMap<CellId, IdSet>, key: &CellId, link: &CellId) {
    if let Some(set) = map.get_mut(key) {
        set.shift_remove(link);
        if set.is_empty() {
            map.remove(key);
        }
    }
}
