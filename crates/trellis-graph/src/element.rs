//! Element geometry and ports.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use trellis_routing::geom::{PointExt, RectExt, Size, from_polar, normalize_angle, size};
use trellis_routing::{Point, Rect, point, rect};

use crate::cell::{
    Cell, CellId, CellKind, ChangeOptions, decode, json_num, json_point, string_or_number,
};
use crate::error::{Error, Result};
use crate::path::{IntoPropertyPath, PathSegment, PropertyPath};

/// One port of an element. Everything except `id` and `group` is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Port {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            group: None,
            attributes: Map::new(),
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Port id. Ports read back from a cell always carry one.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ports {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub groups: Map<String, Value>,
    #[serde(default)]
    pub items: Vec<Port>,
}

impl Ports {
    fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.items.is_empty()
    }
}

/// Typed part of an element cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub position: Point,
    pub size: Size,
    pub angle: f64,
    pub ports: Ports,
}

impl Default for ElementData {
    fn default() -> Self {
        Self {
            position: point(0.0, 0.0),
            size: size(1.0, 1.0),
            angle: 0.0,
            ports: Ports::default(),
        }
    }
}

impl ElementData {
    pub(crate) fn is_key(key: &str) -> bool {
        matches!(key, "position" | "size" | "angle" | "ports")
    }

    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        match key {
            "position" => Some(json_point(self.position)),
            "size" => Some(json!({
                "width": json_num(self.size.width),
                "height": json_num(self.size.height),
            })),
            "angle" => Some(json_num(self.angle)),
            "ports" => (!self.ports.is_empty())
                .then(|| serde_json::to_value(&self.ports).ok())
                .flatten(),
            _ => None,
        }
    }

    pub(crate) fn set(&mut self, id: &CellId, key: &str, value: Option<Value>) -> Result<()> {
        match key {
            "position" => {
                self.position = match value {
                    None => point(0.0, 0.0),
                    Some(v) => decode::<Xy>(key, v)?.into(),
                }
            }
            "size" => {
                self.size = match value {
                    None => size(1.0, 1.0),
                    Some(v) => {
                        let wh: Wh = decode(key, v)?;
                        size(wh.width, wh.height)
                    }
                }
            }
            "angle" => {
                self.angle = match value {
                    None => 0.0,
                    Some(v) => decode(key, v)?,
                }
            }
            "ports" => {
                let mut ports: Ports = match value {
                    None => Ports::default(),
                    Some(v) => decode(key, v)?,
                };
                for port in &mut ports.items {
                    if port.id.is_none() {
                        port.id = Some(CellId::generate().to_string());
                    }
                }
                for (i, port) in ports.items.iter().enumerate() {
                    if ports.items[..i].iter().any(|p| p.id == port.id) {
                        return Err(Error::DuplicatePortId {
                            id: id.clone(),
                            port: port.id().to_string(),
                        });
                    }
                }
                self.ports = ports;
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn write_json(&self, out: &mut Map<String, Value>) {
        for key in ["position", "size", "angle", "ports"] {
            if let Some(v) = self.get(key) {
                out.insert(key.to_string(), v);
            }
        }
    }

    /// Unrotated model box.
    pub fn bbox(&self) -> Rect {
        rect(
            self.position.x,
            self.position.y,
            self.size.width,
            self.size.height,
        )
    }

    /// Bounding box of the rotated element.
    pub fn rotated_bbox(&self) -> Rect {
        self.bbox().rotated_bbox(self.angle)
    }

    pub fn center(&self) -> Point {
        self.bbox().center()
    }

    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.items.iter().find(|p| p.id.as_deref() == Some(id))
    }

    pub fn port_index(&self, id: &str) -> Option<usize> {
        self.ports
            .items
            .iter()
            .position(|p| p.id.as_deref() == Some(id))
    }
}

#[derive(Deserialize)]
struct Xy {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

impl From<Xy> for Point {
    fn from(v: Xy) -> Self {
        point(v.x, v.y)
    }
}

#[derive(Deserialize)]
struct Wh {
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

/// The edge or corner an interactive resize is dragged from. The opposite corner stays put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeDirection {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeDirection {
    /// Quadrant of the fixed corner around the element center, counted counter-clockwise on
    /// screen from the bottom-left one.
    fn quadrant(self) -> usize {
        match self {
            ResizeDirection::TopRight | ResizeDirection::Right => 0,
            ResizeDirection::TopLeft | ResizeDirection::Top => 1,
            ResizeDirection::BottomLeft | ResizeDirection::Left => 2,
            ResizeDirection::BottomRight | ResizeDirection::Bottom => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResizeOptions {
    pub direction: Option<ResizeDirection>,
    /// Interpret `direction` on screen, after the element rotation.
    pub absolute: bool,
}

impl ResizeOptions {
    pub fn towards(direction: ResizeDirection) -> Self {
        Self {
            direction: Some(direction),
            absolute: false,
        }
    }
}

impl Cell {
    fn element_data(&self) -> Result<&ElementData> {
        self.as_element().ok_or_else(|| Error::NotAnElement {
            id: self.id().clone(),
        })
    }

    pub fn position(&self) -> Option<Point> {
        self.as_element().map(|e| e.position)
    }

    pub fn size(&self) -> Option<Size> {
        self.as_element().map(|e| e.size)
    }

    pub fn angle(&self) -> Option<f64> {
        self.as_element().map(|e| normalize_angle(e.angle))
    }

    pub fn bbox(&self) -> Option<Rect> {
        self.as_element().map(ElementData::bbox)
    }

    pub fn rotated_bbox(&self) -> Option<Rect> {
        self.as_element().map(ElementData::rotated_bbox)
    }

    pub fn center(&self) -> Option<Point> {
        self.as_element().map(ElementData::center)
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        if let CellKind::Element(data) = &mut self.kind {
            data.position = point(x, y);
        }
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        if let CellKind::Element(data) = &mut self.kind {
            data.size = size(width, height);
        }
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        if let CellKind::Element(data) = &mut self.kind {
            data.angle = angle;
        }
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = Port>) -> Self {
        if let CellKind::Element(data) = &mut self.kind {
            data.ports.items = ports
                .into_iter()
                .map(|mut port| {
                    port.id.get_or_insert_with(|| CellId::generate().to_string());
                    port
                })
                .collect();
        }
        self
    }

    pub fn set_position(&mut self, p: Point, options: &ChangeOptions) -> Result<()> {
        self.element_data()?;
        self.set("position", json_point(p), options)
    }

    /// Moves the element alone. Embedded cells follow only through `Graph::translate_cell`.
    pub fn translate(&mut self, dx: f64, dy: f64, options: &ChangeOptions) -> Result<()> {
        if self.is_link() {
            return self.translate_link(dx, dy, options);
        }
        if dx == 0.0 && dy == 0.0 {
            return Ok(());
        }
        let position = self.element_data()?.position;
        self.set_position(position.offset(dx, dy), options)
    }

    /// Sets the size. With a direction the corner opposite to it keeps its place on screen,
    /// taking the rotation into account.
    pub fn resize(
        &mut self,
        width: f64,
        height: f64,
        resize: &ResizeOptions,
        options: &ChangeOptions,
    ) -> Result<()> {
        let data = self.element_data()?;
        let Some(direction) = resize.direction else {
            return self.set_size(width, height, options);
        };
        let (mut width, mut height) = (width, height);
        match direction {
            ResizeDirection::Left | ResizeDirection::Right => height = data.size.height,
            ResizeDirection::Top | ResizeDirection::Bottom => width = data.size.width,
            _ => {}
        }

        let angle = normalize_angle(data.angle);
        let bbox = data.bbox();
        let origin = if angle != 0.0 {
            let mut quadrant = direction.quadrant();
            if resize.absolute {
                quadrant = (quadrant + ((angle + 45.0) / 90.0).floor() as usize) % 4;
            }
            let fixed = [bbox.bottom_left(), bbox.corner(), bbox.top_right(), bbox.origin]
                [quadrant];
            let image = fixed.rotate_around(bbox.center(), -angle);
            let radius = (width * width + height * height).sqrt() / 2.0;
            let mut alpha = quadrant as f64 * PI / 2.0;
            alpha += if quadrant % 2 == 0 {
                (height / width).atan()
            } else {
                (width / height).atan()
            };
            alpha -= angle.to_radians();
            from_polar(radius, alpha, image).offset(-width / 2.0, -height / 2.0)
        } else {
            let (dx, dy) = match direction {
                ResizeDirection::Top | ResizeDirection::TopRight => (0.0, bbox.height() - height),
                ResizeDirection::Left | ResizeDirection::BottomLeft => (bbox.width() - width, 0.0),
                ResizeDirection::TopLeft => (bbox.width() - width, bbox.height() - height),
                _ => (0.0, 0.0),
            };
            bbox.origin.offset(dx, dy)
        };

        self.set_size(width, height, options)?;
        self.set_position(origin, options)
    }

    fn set_size(&mut self, width: f64, height: f64, options: &ChangeOptions) -> Result<()> {
        self.element_data()?;
        self.set(
            "size",
            json!({"width": json_num(width), "height": json_num(height)}),
            options,
        )
    }

    /// Scales the model box about `origin`.
    pub fn scale(&mut self, sx: f64, sy: f64, origin: Point, options: &ChangeOptions) -> Result<()> {
        if self.is_link() {
            return self.scale_link(sx, sy, origin, options);
        }
        let scaled = self.element_data()?.bbox().scale_about(sx, sy, origin);
        self.set_position(scaled.origin, options)?;
        self.set_size(scaled.size.width, scaled.size.height, options)
    }

    pub fn set_angle(&mut self, angle: f64, options: &ChangeOptions) -> Result<()> {
        self.element_data()?;
        self.set("angle", json_num(angle), options)
    }

    /// Rotates by `angle` degrees (or to `angle` when `absolute`). With an `origin` the element
    /// center also orbits that point.
    pub fn rotate(
        &mut self,
        angle: f64,
        absolute: bool,
        origin: Option<Point>,
        options: &ChangeOptions,
    ) -> Result<()> {
        let data = self.element_data()?;
        let current = data.angle;
        let next = if absolute {
            angle
        } else {
            (current + angle) % 360.0
        };
        if let Some(origin) = origin {
            let center = data.center().rotate_around(origin, current - next);
            let position = point(
                center.x - data.size.width / 2.0,
                center.y - data.size.height / 2.0,
            );
            self.set_position(position, options)?;
        }
        self.set_angle(next, options)
    }

    pub fn has_ports(&self) -> bool {
        self.as_element().is_some_and(|e| !e.ports.items.is_empty())
    }

    pub fn has_port(&self, id: &str) -> bool {
        self.as_element().is_some_and(|e| e.port(id).is_some())
    }

    pub fn ports(&self) -> &[Port] {
        self.as_element()
            .map(|e| e.ports.items.as_slice())
            .unwrap_or_default()
    }

    pub fn port(&self, id: &str) -> Option<&Port> {
        self.as_element().and_then(|e| e.port(id))
    }

    pub fn port_index(&self, id: &str) -> Option<usize> {
        self.as_element().and_then(|e| e.port_index(id))
    }

    pub fn group_ports(&self, group: &str) -> Vec<&Port> {
        self.ports()
            .iter()
            .filter(|p| p.group.as_deref() == Some(group))
            .collect()
    }

    pub fn port_group_names(&self) -> Vec<&str> {
        self.as_element()
            .map(|e| e.ports.groups.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn add_port(&mut self, port: Port, options: &ChangeOptions) -> Result<()> {
        self.add_ports(vec![port], options)
    }

    pub fn add_ports(&mut self, ports: Vec<Port>, options: &ChangeOptions) -> Result<()> {
        if ports.is_empty() {
            return Ok(());
        }
        let mut items = self.element_data()?.ports.items.clone();
        items.extend(ports);
        self.set_port_items(items, options)
    }

    /// Inserts before `index`, clamped to the end.
    pub fn insert_port(&mut self, index: usize, port: Port, options: &ChangeOptions) -> Result<()> {
        let mut items = self.element_data()?.ports.items.clone();
        items.insert(index.min(items.len()), port);
        self.set_port_items(items, options)
    }

    /// Removes a port. Unknown ids do nothing.
    pub fn remove_port(&mut self, id: &str, options: &ChangeOptions) -> Result<()> {
        self.remove_ports(Some(&[id]), options)
    }

    /// Removes the listed ports, or all of them for `None`.
    pub fn remove_ports(&mut self, ids: Option<&[&str]>, options: &ChangeOptions) -> Result<()> {
        let data = self.element_data()?;
        let items: Vec<Port> = match ids {
            None => Vec::new(),
            Some(ids) => data
                .ports
                .items
                .iter()
                .filter(|p| !ids.iter().any(|id| *id == p.id()))
                .cloned()
                .collect(),
        };
        if items.len() == data.ports.items.len() {
            return Ok(());
        }
        self.set_port_items(items, options)
    }

    fn set_port_items(&mut self, items: Vec<Port>, options: &ChangeOptions) -> Result<()> {
        let value = serde_json::to_value(&items).map_err(|err| Error::InvalidAttribute {
            key: "ports".to_string(),
            message: err.to_string(),
        })?;
        self.set("ports/items", value, options)
    }

    fn port_path(&self, id: &str, path: &str) -> Result<PropertyPath> {
        let index = self.port_index(id).ok_or_else(|| Error::InvalidAttribute {
            key: "ports".to_string(),
            message: format!("no port with id `{id}`"),
        })?;
        let mut segments = vec![
            PathSegment::from("ports"),
            PathSegment::from("items"),
            PathSegment::from(index),
        ];
        if !path.is_empty() {
            segments.extend(path.into_path()?.segments().iter().cloned());
        }
        PropertyPath::from_segments(segments)
    }

    /// Reads a port attribute. An empty `path` reads the whole port.
    pub fn port_prop(&self, id: &str, path: &str) -> Result<Option<Value>> {
        self.get(self.port_path(id, path)?)
    }

    pub fn set_port_prop(
        &mut self,
        id: &str,
        path: &str,
        value: Value,
        options: &ChangeOptions,
    ) -> Result<()> {
        let path = self.port_path(id, path)?;
        self.set(path, value, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(p: Point) -> Point {
        p.round_to(6)
    }

    #[test]
    fn directional_resize_keeps_the_opposite_corner() {
        let mut cell = Cell::element("standard.Rectangle")
            .with_position(100.0, 100.0)
            .with_size(50.0, 50.0);
        let opts = ChangeOptions::new();
        cell.resize(80.0, 70.0, &ResizeOptions::towards(ResizeDirection::TopLeft), &opts)
            .unwrap();
        assert_eq!(cell.bbox(), Some(rect(70.0, 80.0, 80.0, 70.0)));

        cell.resize(10.0, 10.0, &ResizeOptions::towards(ResizeDirection::Left), &opts)
            .unwrap();
        assert_eq!(cell.bbox(), Some(rect(140.0, 80.0, 10.0, 70.0)));
    }

    #[test]
    fn rotated_resize_keeps_the_fixed_corner_on_screen() {
        let mut cell = Cell::element("standard.Rectangle")
            .with_position(0.0, 0.0)
            .with_size(100.0, 50.0)
            .with_angle(90.0);
        let before = cell.bbox().unwrap();
        let fixed = before.origin.rotate_around(before.center(), -90.0);
        cell.resize(
            40.0,
            60.0,
            &ResizeOptions::towards(ResizeDirection::BottomRight),
            &ChangeOptions::new(),
        )
        .unwrap();
        let after = cell.bbox().unwrap();
        assert_eq!(after.size, size(40.0, 60.0));
        assert_eq!(
            round(after.origin.rotate_around(after.center(), -90.0)),
            round(fixed)
        );
    }

    #[test]
    fn rotate_around_origin_orbits_the_center() {
        let mut cell = Cell::element("standard.Rectangle")
            .with_position(90.0, -10.0)
            .with_size(20.0, 20.0);
        cell.rotate(90.0, false, Some(point(0.0, 0.0)), &ChangeOptions::new())
            .unwrap();
        assert_eq!(cell.angle(), Some(90.0));
        assert_eq!(round(cell.center().unwrap()), point(0.0, 100.0));
    }

    #[test]
    fn ports_get_ids_and_reject_duplicates() {
        let mut cell = Cell::element("standard.Rectangle");
        let opts = ChangeOptions::new();
        cell.set("ports", json!({"items": [{"group": "in"}]}), &opts)
            .unwrap();
        assert!(!cell.ports()[0].id().is_empty());

        cell.add_port(Port::new("a"), &opts).unwrap();
        let err = cell.add_port(Port::new("a"), &opts).unwrap_err();
        assert!(matches!(err, Error::DuplicatePortId { .. }));
        assert_eq!(cell.ports().len(), 2);

        cell.set_port_prop("a", "attrs/circle/r", json!(5), &opts)
            .unwrap();
        assert_eq!(cell.port_prop("a", "attrs/circle/r").unwrap(), Some(json!(5)));
        cell.remove_port("a", &opts).unwrap();
        assert!(!cell.has_port("a"));
    }

    #[test]
    fn links_are_not_elements() {
        let mut link = Cell::link("standard.Link");
        let err = link
            .set_angle(10.0, &ChangeOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotAnElement { .. }));
    }
}
