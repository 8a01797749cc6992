//! Link ends, vertices and labels.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trellis_routing::geom::{PointExt, scale_point};
use trellis_routing::spec::Offset;
use trellis_routing::{NamedSpec, Point, point};

use crate::cell::{Cell, CellId, ChangeOptions, decode, json_num, json_point};
use crate::error::{Error, Result};

/// One end of a link: a free point or a reference to a cell (optionally one of its ports).
///
/// `args` keeps every other key of the end descriptor (`anchor`, `connectionPoint`, `selector`,
/// `magnet`, `priority`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEnd {
    Point {
        point: Point,
        args: Map<String, Value>,
    },
    Cell {
        id: CellId,
        port: Option<String>,
        args: Map<String, Value>,
    },
}

impl Default for LinkEnd {
    fn default() -> Self {
        LinkEnd::point(0.0, 0.0)
    }
}

impl LinkEnd {
    pub fn point(x: f64, y: f64) -> Self {
        LinkEnd::Point {
            point: point(x, y),
            args: Map::new(),
        }
    }

    pub fn cell(id: impl Into<CellId>) -> Self {
        LinkEnd::Cell {
            id: id.into(),
            port: None,
            args: Map::new(),
        }
    }

    /// Attaches to a port. Has no effect on point ends.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        if let LinkEnd::Cell { port: slot, .. } = &mut self {
            *slot = Some(port.into());
        }
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        match &mut self {
            LinkEnd::Point { args, .. } | LinkEnd::Cell { args, .. } => {
                args.insert(key.into(), value.into());
            }
        }
        self
    }

    pub fn args(&self) -> &Map<String, Value> {
        match self {
            LinkEnd::Point { args, .. } | LinkEnd::Cell { args, .. } => args,
        }
    }

    pub fn id(&self) -> Option<&CellId> {
        match self {
            LinkEnd::Cell { id, .. } => Some(id),
            LinkEnd::Point { .. } => None,
        }
    }

    pub fn port_id(&self) -> Option<&str> {
        match self {
            LinkEnd::Cell { port, .. } => port.as_deref(),
            LinkEnd::Point { .. } => None,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self {
            LinkEnd::Point { point, .. } => Some(*point),
            LinkEnd::Cell { .. } => None,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, LinkEnd::Point { .. })
    }

    /// `Ok(None)` when the end does not set one. A malformed value is an error.
    pub fn anchor(&self) -> Result<Option<NamedSpec>> {
        named("anchor", self.args().get("anchor"))
    }

    pub fn connection_point(&self) -> Result<Option<NamedSpec>> {
        named("connectionPoint", self.args().get("connectionPoint"))
    }

    /// Sub-node the end is attached to, from `selector` or the legacy `magnet` key.
    pub fn selector(&self) -> Option<&str> {
        let args = self.args();
        args.get("selector")
            .or_else(|| args.get("magnet"))
            .and_then(Value::as_str)
    }

    /// Whether the anchor is computed first for this end.
    pub fn has_priority(&self) -> bool {
        matches!(self.args().get("priority"), Some(Value::Bool(true)))
    }

    /// Same cell and same effective port, or the same free point. A missing port equals a
    /// missing one only.
    pub fn ends_equal(a: &LinkEnd, b: &LinkEnd) -> bool {
        match (a, b) {
            (LinkEnd::Point { point: p, .. }, LinkEnd::Point { point: q, .. }) => p == q,
            (
                LinkEnd::Cell {
                    id: a_id,
                    port: a_port,
                    ..
                },
                LinkEnd::Cell {
                    id: b_id,
                    port: b_port,
                    ..
                },
            ) => a_id == b_id && a_port == b_port,
            _ => false,
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            LinkEnd::Point { point, args } => {
                map.insert("x".to_string(), json_num(point.x));
                map.insert("y".to_string(), json_num(point.y));
                map.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            LinkEnd::Cell { id, port, args } => {
                map.insert("id".to_string(), Value::String(id.to_string()));
                if let Some(port) = port {
                    map.insert("port".to_string(), Value::String(port.clone()));
                }
                map.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Value::Object(map)
    }

    pub(crate) fn from_value(value: Value) -> std::result::Result<Self, String> {
        let Value::Object(mut map) = value else {
            return Err("a link end must be an object".to_string());
        };
        match map.shift_remove("id") {
            Some(Value::Null) | None => {
                let x = take_coordinate(&mut map, "x")?;
                let y = take_coordinate(&mut map, "y")?;
                Ok(LinkEnd::Point {
                    point: point(x, y),
                    args: map,
                })
            }
            Some(id) => {
                let id: CellId = serde_json::from_value(id).map_err(|err| err.to_string())?;
                let port = match map.shift_remove("port") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    Some(_) => return Err("`port` must be a string or a number".to_string()),
                };
                Ok(LinkEnd::Cell {
                    id,
                    port,
                    args: map,
                })
            }
        }
    }
}

fn take_coordinate(map: &mut Map<String, Value>, key: &str) -> std::result::Result<f64, String> {
    match map.shift_remove(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| format!("`{key}` is out of range")),
        Some(_) => Err(format!("`{key}` must be a number")),
    }
}

/// A strategy spec stored under `key`. `null` counts as unset.
fn named(key: &str, value: Option<&Value>) -> Result<Option<NamedSpec>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode(key, value.clone()).map(Some),
    }
}

impl Serialize for LinkEnd {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LinkEnd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        LinkEnd::from_value(Value::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

impl From<Point> for LinkEnd {
    fn from(p: Point) -> Self {
        LinkEnd::Point {
            point: p,
            args: Map::new(),
        }
    }
}

impl From<&Cell> for LinkEnd {
    fn from(cell: &Cell) -> Self {
        LinkEnd::cell(cell.id().clone())
    }
}

impl From<CellId> for LinkEnd {
    fn from(id: CellId) -> Self {
        LinkEnd::cell(id)
    }
}

impl From<&CellId> for LinkEnd {
    fn from(id: &CellId) -> Self {
        LinkEnd::cell(id.clone())
    }
}

/// A link label, kept as its raw JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub Map<String, Value>);

impl Label {
    pub fn new() -> Self {
        Self::default()
    }

    /// A label at `distance` along the link: a ratio in `[0, 1]`, or an absolute length
    /// (negative values measure from the target).
    pub fn at(distance: f64) -> Self {
        let mut map = Map::new();
        map.insert("position".to_string(), json_num(distance));
        Self(map)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn position(&self) -> Option<LabelPosition> {
        self.0
            .get("position")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Placement of a label along its link.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelPosition {
    pub distance: f64,
    pub offset: Option<Offset>,
    pub angle: f64,
    pub args: Map<String, Value>,
}

impl<'de> Deserialize<'de> for LabelPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Distance(f64),
            Full {
                #[serde(default)]
                distance: f64,
                #[serde(default)]
                offset: Option<Offset>,
                #[serde(default)]
                angle: f64,
                #[serde(default)]
                args: Map<String, Value>,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Distance(distance) => LabelPosition {
                distance,
                ..LabelPosition::default()
            },
            Raw::Full {
                distance,
                offset,
                angle,
                args,
            } => LabelPosition {
                distance,
                offset,
                angle,
                args,
            },
        })
    }
}

/// Typed part of a link cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkData {
    pub source: LinkEnd,
    pub target: LinkEnd,
    pub vertices: Vec<Point>,
    pub labels: Vec<Label>,
    router: Option<Value>,
    connector: Option<Value>,
}

impl LinkData {
    pub(crate) fn is_key(key: &str) -> bool {
        matches!(
            key,
            "source" | "target" | "vertices" | "labels" | "router" | "connector"
        )
    }

    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        match key {
            "source" => Some(self.source.to_value()),
            "target" => Some(self.target.to_value()),
            "vertices" => (!self.vertices.is_empty())
                .then(|| Value::Array(self.vertices.iter().copied().map(json_point).collect())),
            "labels" => (!self.labels.is_empty()).then(|| {
                Value::Array(
                    self.labels
                        .iter()
                        .map(|l| Value::Object(l.0.clone()))
                        .collect(),
                )
            }),
            "router" => self.router.clone(),
            "connector" => self.connector.clone(),
            _ => None,
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        let invalid = |message: String| Error::InvalidAttribute {
            key: key.to_string(),
            message,
        };
        match key {
            "source" | "target" => {
                let end = match value {
                    None => LinkEnd::default(),
                    Some(v) => LinkEnd::from_value(v).map_err(invalid)?,
                };
                if key == "source" {
                    self.source = end;
                } else {
                    self.target = end;
                }
            }
            "vertices" => {
                self.vertices = match value {
                    None => Vec::new(),
                    Some(v) => decode::<Vec<Xy>>(key, v)?
                        .into_iter()
                        .map(|v| point(v.x, v.y))
                        .collect(),
                }
            }
            "labels" => {
                self.labels = match value {
                    None => Vec::new(),
                    Some(v) => decode(key, v)?,
                }
            }
            // Checked when the link enters a graph or commits an update.
            "router" | "connector" => {
                if key == "router" {
                    self.router = value;
                } else {
                    self.connector = value;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn write_json(&self, out: &mut Map<String, Value>) {
        for key in ["source", "target", "vertices", "labels", "router", "connector"] {
            if let Some(v) = self.get(key) {
                out.insert(key.to_string(), v);
            }
        }
    }

    pub fn router(&self) -> Result<Option<NamedSpec>> {
        named("router", self.router.as_ref())
    }

    pub fn connector(&self) -> Result<Option<NamedSpec>> {
        named("connector", self.connector.as_ref())
    }

    /// Both ends attached to the same cell.
    pub fn has_loop(&self) -> bool {
        match (self.source.id(), self.target.id()) {
            (Some(s), Some(t)) => s == t,
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct Xy {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

/// Position of an item addressed with a possibly negative index, `None` when out of range.
fn resolve_index(index: isize, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        len as isize + index
    } else {
        index
    };
    (0..len as isize).contains(&resolved).then_some(resolved as usize)
}

/// Insertion slot: negative indices count from the end (`-1` appends), then clamp.
fn insert_index(index: isize, len: usize) -> usize {
    let resolved = if index < 0 {
        len as isize + index + 1
    } else {
        index
    };
    resolved.clamp(0, len as isize) as usize
}

impl Cell {
    fn link_data(&self) -> Result<&LinkData> {
        self.as_link().ok_or_else(|| Error::NotALink {
            id: self.id().clone(),
        })
    }

    pub fn source(&self) -> Option<&LinkEnd> {
        self.as_link().map(|l| &l.source)
    }

    pub fn target(&self) -> Option<&LinkEnd> {
        self.as_link().map(|l| &l.target)
    }

    pub fn with_source(self, end: impl Into<LinkEnd>) -> Self {
        let end = end.into().to_value();
        self.with_attr("source", end)
    }

    pub fn with_target(self, end: impl Into<LinkEnd>) -> Self {
        let end = end.into().to_value();
        self.with_attr("target", end)
    }

    pub fn with_vertices(self, vertices: impl IntoIterator<Item = Point>) -> Self {
        let vertices = Value::Array(vertices.into_iter().map(json_point).collect());
        self.with_attr("vertices", vertices)
    }

    pub fn with_router(self, router: Value) -> Self {
        self.with_attr("router", router)
    }

    pub fn with_connector(self, connector: Value) -> Self {
        self.with_attr("connector", connector)
    }

    pub fn set_source(&mut self, end: impl Into<LinkEnd>, options: &ChangeOptions) -> Result<()> {
        self.link_data()?;
        self.set("source", end.into().to_value(), options)
    }

    pub fn set_target(&mut self, end: impl Into<LinkEnd>, options: &ChangeOptions) -> Result<()> {
        self.link_data()?;
        self.set("target", end.into().to_value(), options)
    }

    /// Moves every end that references a cell to the origin. Free-point ends stay put. Use
    /// `Graph::disconnect_link` to keep the ends where the elements are.
    pub fn disconnect(&mut self, options: &ChangeOptions) -> Result<()> {
        if !self.source().is_some_and(LinkEnd::is_point) {
            self.set_source(LinkEnd::default(), options)?;
        }
        if !self.target().is_some_and(LinkEnd::is_point) {
            self.set_target(LinkEnd::default(), options)?;
        }
        Ok(())
    }

    pub fn vertices(&self) -> &[Point] {
        self.as_link()
            .map(|l| l.vertices.as_slice())
            .unwrap_or_default()
    }

    /// Vertex at `index`; negative indices count from the end.
    pub fn vertex(&self, index: isize) -> Option<Point> {
        let vertices = self.vertices();
        resolve_index(index, vertices.len()).map(|i| vertices[i])
    }

    pub fn set_vertices(&mut self, vertices: Vec<Point>, options: &ChangeOptions) -> Result<()> {
        self.link_data()?;
        let value = Value::Array(vertices.into_iter().map(json_point).collect());
        self.set("vertices", value, options)
    }

    pub fn set_vertex(&mut self, index: isize, p: Point, options: &ChangeOptions) -> Result<()> {
        let mut vertices = self.link_data()?.vertices.clone();
        let Some(i) = resolve_index(index, vertices.len()) else {
            return Err(Error::InvalidAttribute {
                key: "vertices".to_string(),
                message: format!("no vertex at index {index}"),
            });
        };
        vertices[i] = p;
        self.set_vertices(vertices, options)
    }

    /// Inserts a vertex; `-1` appends and out-of-range indices are clamped.
    pub fn insert_vertex(&mut self, index: isize, p: Point, options: &ChangeOptions) -> Result<()> {
        let mut vertices = self.link_data()?.vertices.clone();
        vertices.insert(insert_index(index, vertices.len()), p);
        self.set_vertices(vertices, options)
    }

    /// Removes a vertex. Out-of-range indices do nothing.
    pub fn remove_vertex(&mut self, index: isize, options: &ChangeOptions) -> Result<()> {
        let mut vertices = self.link_data()?.vertices.clone();
        let Some(i) = resolve_index(index, vertices.len()) else {
            return Ok(());
        };
        vertices.remove(i);
        self.set_vertices(vertices, options)
    }

    pub fn labels(&self) -> &[Label] {
        self.as_link()
            .map(|l| l.labels.as_slice())
            .unwrap_or_default()
    }

    pub fn has_labels(&self) -> bool {
        !self.labels().is_empty()
    }

    pub fn label(&self, index: isize) -> Option<&Label> {
        let labels = self.labels();
        resolve_index(index, labels.len()).map(|i| &labels[i])
    }

    pub fn set_labels(&mut self, labels: Vec<Label>, options: &ChangeOptions) -> Result<()> {
        self.link_data()?;
        let value = Value::Array(labels.into_iter().map(|l| Value::Object(l.0)).collect());
        self.set("labels", value, options)
    }

    /// Deep-merges `label` into the label at `index`.
    pub fn set_label(&mut self, index: isize, label: Label, options: &ChangeOptions) -> Result<()> {
        let len = self.link_data()?.labels.len();
        let Some(i) = resolve_index(index, len) else {
            return Err(Error::InvalidAttribute {
                key: "labels".to_string(),
                message: format!("no label at index {index}"),
            });
        };
        self.merge(format!("labels/{i}"), Value::Object(label.0), options)
    }

    pub fn insert_label(&mut self, index: isize, label: Label, options: &ChangeOptions) -> Result<()> {
        let mut labels = self.link_data()?.labels.clone();
        labels.insert(insert_index(index, labels.len()), label);
        self.set_labels(labels, options)
    }

    pub fn append_label(&mut self, label: Label, options: &ChangeOptions) -> Result<()> {
        self.insert_label(-1, label, options)
    }

    pub fn remove_label(&mut self, index: isize, options: &ChangeOptions) -> Result<()> {
        let mut labels = self.link_data()?.labels.clone();
        let Some(i) = resolve_index(index, labels.len()) else {
            return Ok(());
        };
        labels.remove(i);
        self.set_labels(labels, options)
    }

    /// `Ok(None)` for elements and for links without their own router.
    pub fn router(&self) -> Result<Option<NamedSpec>> {
        self.as_link().map_or(Ok(None), LinkData::router)
    }

    pub fn connector(&self) -> Result<Option<NamedSpec>> {
        self.as_link().map_or(Ok(None), LinkData::connector)
    }

    /// Sets the router, or clears it with `None`.
    pub fn set_router(&mut self, router: Option<NamedSpec>, options: &ChangeOptions) -> Result<()> {
        self.set_named("router", router, options)
    }

    pub fn set_connector(
        &mut self,
        connector: Option<NamedSpec>,
        options: &ChangeOptions,
    ) -> Result<()> {
        self.set_named("connector", connector, options)
    }

    fn set_named(
        &mut self,
        key: &str,
        spec: Option<NamedSpec>,
        options: &ChangeOptions,
    ) -> Result<()> {
        self.link_data()?;
        match spec {
            None => self.remove_prop(key, options),
            Some(spec) => {
                let value = serde_json::to_value(&spec).map_err(|err| Error::InvalidAttribute {
                    key: key.to_string(),
                    message: err.to_string(),
                })?;
                self.set(key, value, options)
            }
        }
    }

    /// Both ends reference the same cell. See `Graph::has_loop_deep` for the embedding-aware
    /// variant.
    pub fn has_loop(&self) -> bool {
        self.as_link().is_some_and(LinkData::has_loop)
    }

    pub(crate) fn translate_link(&mut self, dx: f64, dy: f64, options: &ChangeOptions) -> Result<()> {
        if dx == 0.0 && dy == 0.0 {
            return Ok(());
        }
        self.map_link_points(|p| p.offset(dx, dy), options)
    }

    pub(crate) fn scale_link(
        &mut self,
        sx: f64,
        sy: f64,
        origin: Point,
        options: &ChangeOptions,
    ) -> Result<()> {
        self.map_link_points(|p| scale_point(p, sx, sy, origin), options)
    }

    /// Applies `f` to the free-point ends and the vertices.
    fn map_link_points(&mut self, f: impl Fn(Point) -> Point, options: &ChangeOptions) -> Result<()> {
        let data = self.link_data()?.clone();
        for (key, end) in [("source", data.source), ("target", data.target)] {
            if let LinkEnd::Point { point, args } = end {
                let moved = LinkEnd::Point {
                    point: f(point),
                    args,
                };
                self.set(key, moved.to_value(), options)?;
            }
        }
        if !data.vertices.is_empty() {
            let moved = data.vertices.into_iter().map(&f).collect();
            self.set_vertices(moved, options)?;
        }
        Ok(())
    }
}
