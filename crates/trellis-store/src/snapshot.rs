//! Immutable records of the graph as published to subscribers.

use std::sync::Arc;

use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use trellis_graph::{Cell, CellId, Graph, LinkEnd};

use crate::error::{Error, Result};

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type HashSet<K> = hashbrown::HashSet<K, FxBuildHasher>;

/// Keys that have typed fields on the records.
const ELEMENT_KEYS: [&str; 7] = ["id", "type", "position", "size", "angle", "z", "parent"];
const LINK_KEYS: [&str; 6] = ["id", "type", "source", "target", "z", "parent"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    pub id: CellId,
    #[serde(rename = "type")]
    pub cell_type: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CellId>,
    /// Every other top-level attribute (`attrs`, `ports`, `embeds`, `data`, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl ElementRecord {
    pub fn from_cell(cell: &Cell) -> Self {
        let position = cell.position();
        let size = cell.size();
        Self {
            id: cell.id().clone(),
            cell_type: cell.cell_type().to_string(),
            x: position.map_or(0.0, |p| p.x),
            y: position.map_or(0.0, |p| p.y),
            width: size.map_or(0.0, |s| s.width),
            height: size.map_or(0.0, |s| s.height),
            angle: cell.angle().unwrap_or(0.0),
            z: cell.z(),
            parent: cell.parent().cloned(),
            attributes: rest(cell, &ELEMENT_KEYS),
        }
    }

    /// The flattened cell JSON this record stands for.
    pub fn to_cell_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("id".to_string(), json!(self.id));
        out.insert("type".to_string(), json!(self.cell_type));
        out.insert("position".to_string(), json!({"x": self.x, "y": self.y}));
        out.insert(
            "size".to_string(),
            json!({"width": self.width, "height": self.height}),
        );
        out.insert("angle".to_string(), json!(self.angle));
        insert_shared(&mut out, self.z, self.parent.as_ref(), &self.attributes);
        Value::Object(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub id: CellId,
    #[serde(rename = "type")]
    pub cell_type: String,
    pub source: LinkEnd,
    pub target: LinkEnd,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CellId>,
    /// Every other top-level attribute (`vertices`, `labels`, `router`, `attrs`, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl LinkRecord {
    pub fn from_cell(cell: &Cell) -> Self {
        Self {
            id: cell.id().clone(),
            cell_type: cell.cell_type().to_string(),
            source: cell.source().cloned().unwrap_or_default(),
            target: cell.target().cloned().unwrap_or_default(),
            z: cell.z(),
            parent: cell.parent().cloned(),
            attributes: rest(cell, &LINK_KEYS),
        }
    }

    pub fn to_cell_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("id".to_string(), json!(self.id));
        out.insert("type".to_string(), json!(self.cell_type));
        out.insert("source".to_string(), json!(self.source));
        out.insert("target".to_string(), json!(self.target));
        insert_shared(&mut out, self.z, self.parent.as_ref(), &self.attributes);
        Value::Object(out)
    }
}

fn rest(cell: &Cell, typed: &[&str]) -> Map<String, Value> {
    match cell.to_json() {
        Value::Object(mut map) => {
            map.retain(|key, _| !typed.contains(&key.as_str()));
            map
        }
        _ => Map::new(),
    }
}

fn insert_shared(
    out: &mut Map<String, Value>,
    z: Option<i64>,
    parent: Option<&CellId>,
    attributes: &Map<String, Value>,
) {
    if let Some(z) = z {
        out.insert("z".to_string(), json!(z));
    }
    if let Some(parent) = parent {
        out.insert("parent".to_string(), json!(parent));
    }
    for (key, value) in attributes {
        out.insert(key.clone(), value.clone());
    }
}

/// Plain, comparable state of a graph: what controlled hosts hold and push back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub elements: Vec<ElementRecord>,
    pub links: Vec<LinkRecord>,
}

impl GraphState {
    pub fn from_json(json: &Value) -> Result<Self> {
        serde_json::from_value(json.clone()).map_err(|err| Error::InvalidState {
            message: err.to_string(),
        })
    }

    pub fn to_json(&self) -> Value {
        json!(self)
    }

    /// Flattened cell JSON, elements first, as accepted by `Graph::sync_cells`.
    pub fn to_cells_json(&self) -> Vec<Value> {
        self.elements
            .iter()
            .map(ElementRecord::to_cell_json)
            .chain(self.links.iter().map(LinkRecord::to_cell_json))
            .collect()
    }
}

/// One published version of the graph. Never mutated after publication.
///
/// Records are shared between consecutive snapshots when their cell did not change, so
/// consumers can skip work per record with [`Arc::ptr_eq`].
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    version: u64,
    elements: Vec<Arc<ElementRecord>>,
    links: Vec<Arc<LinkRecord>>,
}

impl GraphSnapshot {
    /// Snapshot of every cell of `graph`.
    pub fn capture(graph: &Graph, version: u64) -> Self {
        Self::rebuild(graph, version, &Self::default(), None)
    }

    /// Snapshot of `graph` that reuses the records of `previous` for cells not in `dirty`.
    /// `None` rebuilds every record.
    pub(crate) fn rebuild(
        graph: &Graph,
        version: u64,
        previous: &GraphSnapshot,
        dirty: Option<&HashSet<CellId>>,
    ) -> Self {
        let reusable = |id: &CellId| dirty.is_some_and(|d| !d.contains(id));
        let old_elements: HashMap<&str, &Arc<ElementRecord>> = previous
            .elements
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect();
        let old_links: HashMap<&str, &Arc<LinkRecord>> = previous
            .links
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect();

        let mut elements = Vec::new();
        let mut links = Vec::new();
        for cell in graph.cells() {
            let id = cell.id();
            if cell.is_link() {
                let record = match old_links.get(id.as_str()) {
                    Some(old) if reusable(id) => Arc::clone(old),
                    _ => Arc::new(LinkRecord::from_cell(cell)),
                };
                links.push(record);
            } else {
                let record = match old_elements.get(id.as_str()) {
                    Some(old) if reusable(id) => Arc::clone(old),
                    _ => Arc::new(ElementRecord::from_cell(cell)),
                };
                elements.push(record);
            }
        }
        Self {
            version,
            elements,
            links,
        }
    }

    /// Increases by one with every publication.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Elements in z order.
    pub fn elements(&self) -> &[Arc<ElementRecord>] {
        &self.elements
    }

    /// Links in z order.
    pub fn links(&self) -> &[Arc<LinkRecord>] {
        &self.links
    }

    pub fn element(&self, id: &str) -> Option<&Arc<ElementRecord>> {
        self.elements.iter().find(|r| r.id == id)
    }

    pub fn link(&self, id: &str) -> Option<&Arc<LinkRecord>> {
        self.links.iter().find(|r| r.id == id)
    }

    pub fn to_state(&self) -> GraphState {
        GraphState {
            elements: self.elements.iter().map(|r| ElementRecord::clone(r)).collect(),
            links: self.links.iter().map(|r| LinkRecord::clone(r)).collect(),
        }
    }

    /// Deep comparison with a plain state.
    pub fn matches(&self, state: &GraphState) -> bool {
        self.elements.len() == state.elements.len()
            && self.links.len() == state.links.len()
            && self.elements.iter().zip(&state.elements).all(|(a, b)| **a == *b)
            && self.links.iter().zip(&state.links).all(|(a, b)| **a == *b)
    }
}
