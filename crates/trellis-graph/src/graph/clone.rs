//! Cloning groups of cells with their references rewired to the clones.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde_json::Value;

use super::{ConnectedLinksOptions, Graph, HashSet};
use crate::cell::{Cell, CellId};
use crate::link::LinkEnd;

/// Clones keyed by the id of the cell they were cloned from, in input order.
#[derive(Debug, Clone, Default)]
pub struct CloneMap {
    clones: IndexMap<CellId, Cell, FxBuildHasher>,
}

impl CloneMap {
    /// The clone of `original`.
    pub fn get(&self, original: &str) -> Option<&Cell> {
        self.clones.get(original)
    }

    /// Id of the clone of `original`.
    pub fn id_of(&self, original: &str) -> Option<&CellId> {
        self.clones.get(original).map(Cell::id)
    }

    pub fn len(&self) -> usize {
        self.clones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellId, &Cell)> {
        self.clones.iter()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.clones.values()
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.clones.into_values().collect()
    }
}

impl IntoIterator for CloneMap {
    type Item = (CellId, Cell);
    type IntoIter = indexmap::map::IntoIter<CellId, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.clones.into_iter()
    }
}

/// Clones standalone cells. Link ends, parents and embeds that point at another cell of the
/// group are rewired to its clone. Embeds outside the group are dropped; link ends outside the
/// group keep pointing at the original cells.
pub fn clone_cells<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> CloneMap {
    let originals: Vec<&Cell> = {
        let mut seen = IndexMap::<&str, &Cell, FxBuildHasher>::default();
        for cell in cells {
            seen.entry(cell.id().as_str()).or_insert(cell);
        }
        seen.into_values().collect()
    };
    let mut clones: IndexMap<CellId, Cell, FxBuildHasher> = originals
        .iter()
        .map(|cell| (cell.id().clone(), cell.clone_cell()))
        .collect();
    let new_ids: IndexMap<CellId, CellId, FxBuildHasher> = clones
        .iter()
        .map(|(original, clone)| (original.clone(), clone.id().clone()))
        .collect();

    for original in originals {
        let Some(clone) = clones.get_mut(original.id().as_str()) else {
            continue;
        };
        for (key, end) in [("source", original.source()), ("target", original.target())] {
            let Some(end) = end else {
                continue;
            };
            if let Some(new_id) = end.id().and_then(|id| new_ids.get(id.as_str())) {
                write(clone, key, rewire(end, new_id).to_value());
            }
        }
        if let Some(parent) = original.parent().and_then(|p| new_ids.get(p.as_str())) {
            write(clone, "parent", Value::String(parent.to_string()));
        }
        let embeds: Vec<Value> = original
            .embeds()
            .iter()
            .filter_map(|e| new_ids.get(e.as_str()))
            .map(|e| Value::String(e.to_string()))
            .collect();
        if !embeds.is_empty() {
            write(clone, "embeds", Value::Array(embeds));
        }
    }
    CloneMap { clones }
}

fn rewire(end: &LinkEnd, id: &CellId) -> LinkEnd {
    match end {
        LinkEnd::Cell { port, args, .. } => LinkEnd::Cell {
            id: id.clone(),
            port: port.clone(),
            args: args.clone(),
        },
        point @ LinkEnd::Point { .. } => point.clone(),
    }
}

fn write(clone: &mut Cell, key: &str, value: Value) {
    if let Err(err) = clone.write_top(key, Some(value)) {
        tracing::warn!(%key, %err, "could not rewire clone");
    }
}

impl Graph {
    /// Clones the given cells of this graph. See [`clone_cells`].
    pub fn clone_cells(&self, ids: &[CellId]) -> CloneMap {
        clone_cells(ids.iter().filter_map(|id| self.get_cell(id)))
    }

    /// Clones one cell. With `deep`, its embedded descendants are cloned along with it, and so
    /// is every link whose both ends are in that subtree.
    pub fn clone_cell(&self, id: &str, deep: bool) -> CloneMap {
        let mut ids = vec![CellId::from(id)];
        if deep {
            ids.extend(self.embedded_ids(id, &super::EmbeddedCellsOptions::deep()));
            let enclosed: Vec<CellId> = {
                let members: HashSet<&str> = ids.iter().map(CellId::as_str).collect();
                let inside = |end: Option<&LinkEnd>| {
                    end.and_then(LinkEnd::id)
                        .is_some_and(|end_id| members.contains(end_id.as_str()))
                };
                ids.iter()
                    .flat_map(|member| {
                        self.connected_link_ids(member, &ConnectedLinksOptions::default())
                    })
                    .filter(|link| !members.contains(link.as_str()))
                    .filter(|link| {
                        self.get_cell(link)
                            .is_some_and(|link| inside(link.source()) && inside(link.target()))
                    })
                    .collect()
            };
            ids.extend(enclosed);
        }
        self.clone_cells(&ids)
    }

    /// Clones [`Graph::get_subgraph`].
    pub fn clone_subgraph(&self, ids: &[CellId], deep: bool) -> CloneMap {
        clone_cells(self.get_subgraph(ids, deep))
    }
}
