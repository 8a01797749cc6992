//! The diagram graph.
//!
//! `Graph` owns its cells. They are kept sorted by `z` (insertion order breaks ties), and an
//! adjacency index maps every cell id to the links whose source or target reference it.
//!
//! All mutation of an owned cell goes through [`Graph::update`], which validates the result,
//! keeps the index and the z order current, and turns the cell's recorded changes into
//! [`GraphEvent::Change`] events. Failed updates leave the cell as it was.

mod clone;
mod embed;
mod index;
mod options;
mod query;
mod spatial;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use trellis_routing::Point;

pub use clone::{CloneMap, clone_cells};
pub use options::{
    AddOptions, ConnectedLinksOptions, Direction, EmbeddedCellsOptions, FitOptions, GraphOptions,
    NeighborOptions, RemoveOptions, SearchBy, SearchOptions, TranslateOptions, Validations, Visit,
    ZOrderOptions,
};

use crate::cell::{Cell, CellEvent, CellId, ChangeOptions, GraphId};
use crate::error::{Error, Result};
use crate::event::{GraphEvent, Listeners};
use crate::link::LinkEnd;
use crate::registry::CellRegistry;
use index::Topology;

pub(crate) type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
pub(crate) type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

#[derive(Debug)]
pub struct Graph {
    id: GraphId,
    cells: IndexMap<CellId, Cell, FxBuildHasher>,
    topology: Topology,
    /// Highest z any cell ever had. New cells go above it even after the top cell is removed.
    z_high: i64,
    registry: CellRegistry,
    validations: Validations,
    pub(crate) batches: HashMap<String, usize>,
    pub(crate) listeners: Listeners,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    pub fn with_options(options: GraphOptions) -> Self {
        Self {
            id: GraphId::next(),
            cells: IndexMap::default(),
            topology: Topology::default(),
            z_high: 0,
            registry: options.registry,
            validations: options.validations,
            batches: HashMap::default(),
            listeners: Listeners::default(),
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn registry(&self) -> &CellRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CellRegistry {
        &mut self.registry
    }

    pub fn validations(&self) -> Validations {
        self.validations
    }

    pub fn set_validations(&mut self, validations: Validations) {
        self.validations = validations;
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    pub fn get_cell(&self, id: &str) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// Cells in z order.
    pub fn get_cells(&self) -> Vec<&Cell> {
        self.cells.values().collect()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn get_elements(&self) -> Vec<&Cell> {
        self.cells.values().filter(|c| c.is_element()).collect()
    }

    pub fn get_links(&self) -> Vec<&Cell> {
        self.cells.values().filter(|c| c.is_link()).collect()
    }

    /// The bottom-most cell.
    pub fn get_first_cell(&self) -> Option<&Cell> {
        self.cells.first().map(|(_, c)| c)
    }

    /// The top-most cell.
    pub fn get_last_cell(&self) -> Option<&Cell> {
        self.cells.last().map(|(_, c)| c)
    }

    /// Position of `id` in the z order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.cells.get_index_of(id)
    }

    /// `z` of the bottom-most cell, 0 for an empty graph.
    pub fn min_z(&self) -> i64 {
        self.get_first_cell().and_then(Cell::z).unwrap_or(0)
    }

    /// `z` of the top-most cell, 0 for an empty graph.
    pub fn max_z(&self) -> i64 {
        self.get_last_cell().and_then(Cell::z).unwrap_or(0)
    }

    /// Builds a cell from JSON through the registry without adding it.
    pub fn create_cell(&self, json: &serde_json::Value) -> Result<Cell> {
        self.registry.create(json)
    }

    pub fn add_cell(&mut self, cell: Cell, options: &AddOptions) -> Result<()> {
        self.add_cells(vec![cell], options)
    }

    /// Adds cells in order. Cells whose id is already present are skipped. Every cell is
    /// validated before any is added, so parents may arrive in the same call as their children.
    pub fn add_cells(&mut self, cells: Vec<Cell>, options: &AddOptions) -> Result<()> {
        let incoming: HashSet<&str> = cells.iter().map(|c| c.id().as_str()).collect();
        for cell in &cells {
            self.validate_cell(cell, &incoming)?;
        }
        drop(incoming);
        if cells.is_empty() {
            return Ok(());
        }
        let mut batch = self.batch("add");
        for cell in cells {
            if batch.contains(cell.id()) {
                tracing::debug!(id = %cell.id(), "cell already in graph, skipping");
                continue;
            }
            batch.insert(cell, options);
        }
        Ok(())
    }

    /// Replaces every cell at once and emits a single [`GraphEvent::Reset`].
    pub fn reset_cells(&mut self, cells: Vec<Cell>, options: &ChangeOptions) -> Result<()> {
        let incoming: HashSet<&str> = cells.iter().map(|c| c.id().as_str()).collect();
        let previous = std::mem::take(&mut self.cells);
        let topology = std::mem::take(&mut self.topology);
        for cell in &cells {
            if let Err(err) = self.validate_cell(cell, &incoming) {
                self.cells = previous;
                self.topology = topology;
                return Err(err);
            }
        }
        drop(incoming);
        for mut cell in previous.into_values() {
            cell.set_owner(None);
        }
        self.z_high = 0;
        let add = AddOptions {
            dry: false,
            options: options.clone(),
        };
        for cell in cells {
            if !self.contains(cell.id()) {
                self.place(cell, &add);
            }
        }
        tracing::debug!(cells = self.len(), "graph reset");
        self.emit(GraphEvent::Reset {
            options: options.clone(),
        });
        Ok(())
    }

    /// Swaps the cell with the same id for `cell`, emitting `Remove` then `Add`. Links keep
    /// their ends. The z and the embedding carry over unless `cell` sets its own.
    pub(crate) fn replace_cell(&mut self, mut cell: Cell, options: &AddOptions) -> Result<()> {
        let Some(index) = self.cells.get_index_of(cell.id().as_str()) else {
            return self.add_cell(cell, options);
        };
        self.validate_cell(&cell, &HashSet::default())?;
        let old = &self.cells[index];
        let old_role = old.role();
        if cell.z().is_none() {
            cell.set_z_silently(old.z());
        }
        if cell.parent().is_none() {
            if let Some(parent) = old.parent() {
                cell.write_top("parent", Some(serde_json::Value::String(parent.to_string())))?;
            }
        }
        if cell.embeds().is_empty() && !old.embeds().is_empty() {
            let embeds = old.embeds().iter().map(|e| e.to_string().into()).collect();
            cell.write_top("embeds", Some(serde_json::Value::Array(embeds)))?;
        }
        let z_changed = cell.z() != old.z();
        tracing::debug!(id = %cell.id(), from = old.cell_type(), to = cell.cell_type(), "replacing cell");

        let id = cell.id().clone();
        let role = cell.role();
        cell.set_owner((!options.dry).then_some(self.id));
        cell.take_pending();
        self.topology.remove(&id);
        self.topology.add(&cell);
        if let Some(z) = cell.z() {
            self.z_high = self.z_high.max(z);
        }
        let mut old = std::mem::replace(&mut self.cells[index], cell);
        old.set_owner(None);
        if z_changed {
            self.sort_cells();
        }
        self.emit(GraphEvent::Remove {
            id: id.clone(),
            role: old_role,
            options: options.options.clone(),
        });
        self.emit(GraphEvent::Add {
            id,
            role,
            options: options.options.clone(),
        });
        Ok(())
    }

    /// Stores a validated cell and emits `Add`.
    fn insert(&mut self, cell: Cell, options: &AddOptions) {
        let id = cell.id().clone();
        let role = cell.role();
        self.place(cell, options);
        self.emit(GraphEvent::Add {
            id,
            role,
            options: options.options.clone(),
        });
    }

    fn place(&mut self, mut cell: Cell, options: &AddOptions) {
        let z = match cell.z() {
            Some(z) => z,
            None => self.z_high.max(self.max_z()) + 1,
        };
        cell.set_z_silently(Some(z));
        self.z_high = self.z_high.max(z);
        cell.set_owner((!options.dry).then_some(self.id));
        cell.take_pending();
        self.topology.add(&cell);
        let out_of_order = z < self.max_z();
        self.cells.insert(cell.id().clone(), cell);
        if out_of_order {
            self.sort_cells();
        }
    }

    fn sort_cells(&mut self) {
        self.cells
            .sort_by(|_, a, _, b| a.z().unwrap_or(0).cmp(&b.z().unwrap_or(0)));
    }

    /// Mutates an owned cell.
    ///
    /// The cell is restored when `f` fails or when the result does not validate. Otherwise the
    /// index and the z order are brought up to date, links attached to removed ports are
    /// removed, and the changes are reported to the cell's observers and as graph events.
    pub fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut Cell) -> Result<R>) -> Result<R> {
        let Some(cell) = self.cells.get_mut(id) else {
            return Err(Error::NotInGraph { id: id.into() });
        };
        let before = cell.clone();
        let value = match f(cell) {
            Ok(value) => value,
            Err(err) => {
                *cell = before;
                return Err(err);
            }
        };
        if let Err(err) = self.validate_change(id, &before) {
            if let Some(cell) = self.cells.get_mut(id) {
                *cell = before;
            }
            return Err(err);
        }
        self.commit(id, &before)?;
        Ok(value)
    }

    fn commit(&mut self, id: &str, before: &Cell) -> Result<()> {
        let Some(cell) = self.cells.get_mut(id) else {
            return Ok(());
        };
        let changes = cell.take_pending();
        let role = cell.role();
        let ends_changed = cell.is_link()
            && (cell.source() != before.source() || cell.target() != before.target());
        let z_changed = cell.z() != before.z();
        let removed_ports: Vec<String> = before
            .ports()
            .iter()
            .filter(|p| !cell.has_port(p.id()))
            .map(|p| p.id().to_string())
            .collect();

        if ends_changed {
            let cell = &self.cells[id];
            self.topology.update(cell);
        }
        if z_changed {
            if let Some(z) = self.cells[id].z() {
                self.z_high = self.z_high.max(z);
            }
            self.sort_cells();
        }
        if !removed_ports.is_empty() {
            self.remove_port_links(id, &removed_ports)?;
        }
        if let Some(cell) = self.cells.get(id) {
            for change in &changes {
                cell.notify(&CellEvent::from(change.clone()));
            }
        }
        for change in changes {
            self.emit(GraphEvent::Change {
                id: change.id,
                role,
                key: change.key,
                previous: change.previous,
                options: change.options,
            });
        }
        if z_changed {
            self.emit(GraphEvent::Sort);
        }
        Ok(())
    }

    fn remove_port_links(&mut self, id: &str, ports: &[String]) -> Result<()> {
        let on_port = |end: Option<&LinkEnd>| {
            end.and_then(LinkEnd::port_id)
                .is_some_and(|port| ports.iter().any(|p| p == port))
        };
        let links: Vec<CellId> = self
            .topology
            .outbound(id)
            .filter(|l| on_port(self.cells.get(l.as_str()).and_then(Cell::source)))
            .chain(
                self.topology
                    .inbound(id)
                    .filter(|l| on_port(self.cells.get(l.as_str()).and_then(Cell::target))),
            )
            .cloned()
            .collect();
        if !links.is_empty() {
            tracing::debug!(element = id, links = links.len(), "removing links of removed ports");
            self.remove_cells(&links, &RemoveOptions::default())?;
        }
        Ok(())
    }

    /// Shorthand for a path write through [`Graph::update`].
    pub fn set(
        &mut self,
        id: &str,
        path: &str,
        value: serde_json::Value,
        options: &ChangeOptions,
    ) -> Result<()> {
        self.update(id, |cell| cell.set(path, value, options))
    }

    pub fn remove_cell(&mut self, id: &str, options: &RemoveOptions) -> Result<Option<Cell>> {
        let mut removed = self.remove_cells(&[CellId::from(id)], options)?;
        let position = removed.iter().position(|c| c.id().as_str() == id);
        Ok(position.map(|i| removed.swap_remove(i)))
    }

    /// Removes cells, their embedded descendants and (unless `disconnect_links` is set) the
    /// links attached to them. Returns every removed cell, detached from the graph.
    pub fn remove_cells(&mut self, ids: &[CellId], options: &RemoveOptions) -> Result<Vec<Cell>> {
        let mut removed = Vec::new();
        if ids.is_empty() {
            return Ok(removed);
        }
        let mut batch = self.batch("remove");
        for id in ids {
            batch.remove_one(id, options, false, &mut removed)?;
        }
        Ok(removed)
    }

    fn remove_one(
        &mut self,
        id: &CellId,
        options: &RemoveOptions,
        clearing: bool,
        removed: &mut Vec<Cell>,
    ) -> Result<()> {
        let Some(cell) = self.cells.get(id.as_str()) else {
            return Ok(());
        };
        let parent = cell.parent().cloned();
        let embeds = cell.embeds().to_vec();
        let is_element = cell.is_element();

        if let Some(parent) = parent {
            if self.contains(&parent) {
                self.detach_child(&parent, id, &options.options)?;
            }
        }
        for child in &embeds {
            self.remove_one(child, options, clearing, removed)?;
        }
        if !clearing {
            let links = self.connected_link_ids(id, &ConnectedLinksOptions::default());
            if options.disconnect_links && is_element {
                for link in &links {
                    self.detach_link_ends(link, Some(id), &options.options)?;
                }
            } else {
                for link in &links {
                    self.remove_one(link, options, clearing, removed)?;
                }
            }
        }

        let Some(mut cell) = self.cells.shift_remove(id.as_str()) else {
            return Ok(());
        };
        self.topology.remove(id);
        cell.set_owner(None);
        cell.set_z_silently(None);
        cell.take_pending();
        self.emit(GraphEvent::Remove {
            id: id.clone(),
            role: cell.role(),
            options: options.options.clone(),
        });
        removed.push(cell);
        Ok(())
    }

    /// Removes every cell, links first.
    pub fn clear(&mut self, options: &ChangeOptions) -> Result<()> {
        let mut ids: Vec<CellId> = self.cells.keys().cloned().collect();
        ids.sort_by_key(|id| !self.cells[id.as_str()].is_link());
        let remove = RemoveOptions {
            disconnect_links: false,
            options: options.clone(),
        };
        let mut removed = Vec::new();
        let mut batch = self.batch("clear");
        for id in &ids {
            batch.remove_one(id, &remove, true, &mut removed)?;
        }
        Ok(())
    }

    /// Turns every cell-referencing end of a link into a free point. An end referencing an
    /// element in the graph lands on the element's position; other ends land on the origin.
    pub fn disconnect_link(&mut self, id: &str, options: &ChangeOptions) -> Result<()> {
        let Some(cell) = self.cells.get(id) else {
            return Err(Error::NotInGraph { id: id.into() });
        };
        if !cell.is_link() {
            return Err(Error::NotALink { id: id.into() });
        }
        self.detach_link_ends(&CellId::from(id), None, options)
    }

    /// Converts the ends of `link` referencing `only` (or any cell, with `None`) to points.
    fn detach_link_ends(
        &mut self,
        link: &CellId,
        only: Option<&CellId>,
        options: &ChangeOptions,
    ) -> Result<()> {
        let Some(cell) = self.cells.get(link.as_str()) else {
            return Ok(());
        };
        let mut ends = Vec::new();
        for (key, end) in [("source", cell.source()), ("target", cell.target())] {
            let Some(end_id) = end.and_then(LinkEnd::id) else {
                continue;
            };
            if only.is_some_and(|only| only != end_id) {
                continue;
            }
            let at = self.end_position(end_id);
            ends.push((key, LinkEnd::from(at)));
        }
        if ends.is_empty() {
            return Ok(());
        }
        self.update(link.as_str(), |cell| {
            for (key, end) in ends {
                match key {
                    "source" => cell.set_source(end, options)?,
                    _ => cell.set_target(end, options)?,
                }
            }
            Ok(())
        })
    }

    fn end_position(&self, id: &CellId) -> Point {
        self.cells
            .get(id.as_str())
            .and_then(Cell::position)
            .unwrap_or_else(|| trellis_routing::point(0.0, 0.0))
    }
}
