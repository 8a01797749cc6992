//! The cell record shared by elements and links.
//!
//! Well-known top-level keys (`position`, `source`, `z`, ...) live in typed fields. Every other
//! key lives in a JSON attribute map. Path access always goes through the JSON view of the
//! top-level value, so typed and untyped keys behave the same way.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use trellis_routing::Point;

use crate::element::ElementData;
use crate::error::{Error, Result};
use crate::link::LinkData;
use crate::path::{self, IntoPropertyPath};

/// Cell identifier. JSON numbers are accepted and kept as their decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh UUID v4 id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CellId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for CellId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CellId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CellId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl AsRef<str> for CellId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CellId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&CellId> for CellId {
    fn from(value: &CellId) -> Self {
        value.clone()
    }
}

impl<'de> Deserialize<'de> for CellId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(StringOrNumber).map(CellId)
    }
}

/// Accepts a JSON string or number and yields its string form.
pub(crate) struct StringOrNumber;

impl Visitor<'_> for StringOrNumber {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or a number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<String, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<String, E> {
        Ok(v.to_string())
    }
}

pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    struct Optional;

    impl<'de> Visitor<'de> for Optional {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, a number or null")
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(
            self,
            d: D,
        ) -> std::result::Result<Self::Value, D::Error> {
            d.deserialize_any(StringOrNumber).map(Some)
        }
    }

    deserializer.deserialize_option(Optional)
}

/// Identity of the graph owning a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Free-form options passed along with a mutation and handed verbatim to listeners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeOptions(Map<String, Value>);

impl ChangeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `true` when `key` is set to a truthy value.
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellRole {
    Element,
    Link,
}

/// One recorded change of a top-level attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    pub id: CellId,
    pub key: String,
    /// JSON value of the key before the change, `None` when it was unset.
    pub previous: Option<Value>,
    pub options: ChangeOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellEvent {
    Change {
        id: CellId,
        key: String,
        previous: Option<Value>,
        options: ChangeOptions,
    },
}

impl From<CellChange> for CellEvent {
    fn from(change: CellChange) -> Self {
        CellEvent::Change {
            id: change.id,
            key: change.key,
            previous: change.previous,
            options: change.options,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Rc<RefCell<dyn FnMut(&CellEvent)>>;

#[derive(Clone, Default)]
struct Observers {
    next: u64,
    list: Vec<(ObserverId, Observer)>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observers({})", self.list.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellKind {
    Element(ElementData),
    Link(LinkData),
}

pub const ELEMENT_TYPE: &str = "element";
pub const LINK_TYPE: &str = "link";

#[derive(Debug, Clone)]
pub struct Cell {
    id: CellId,
    cell_type: String,
    z: Option<i64>,
    parent: Option<CellId>,
    embeds: Vec<CellId>,
    pub(crate) kind: CellKind,
    attributes: Map<String, Value>,
    owner: Option<GraphId>,
    pending: Vec<CellChange>,
    observers: Observers,
}

impl Cell {
    fn with_kind(cell_type: impl Into<String>, kind: CellKind) -> Self {
        Self {
            id: CellId::generate(),
            cell_type: cell_type.into(),
            z: None,
            parent: None,
            embeds: Vec::new(),
            kind,
            attributes: Map::new(),
            owner: None,
            pending: Vec::new(),
            observers: Observers::default(),
        }
    }

    /// A standalone element with a generated id.
    pub fn element(cell_type: impl Into<String>) -> Self {
        Self::with_kind(cell_type, CellKind::Element(ElementData::default()))
    }

    /// A standalone link with a generated id and both ends at the origin.
    pub fn link(cell_type: impl Into<String>) -> Self {
        Self::with_kind(cell_type, CellKind::Link(LinkData::default()))
    }

    pub fn with_id(mut self, id: impl Into<CellId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_z(mut self, z: i64) -> Self {
        self.z = Some(z);
        self
    }

    /// Builder form of [`Cell::set`] for attributes that cannot fail to decode.
    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        if !is_typed_key(&self.kind, key) {
            self.attributes.insert(key.to_string(), value);
        } else if let Err(err) = self.write_top(key, Some(value)) {
            tracing::warn!(%key, %err, "ignoring invalid builder attribute");
        }
        self
    }

    pub fn id(&self) -> &CellId {
        &self.id
    }

    pub fn cell_type(&self) -> &str {
        &self.cell_type
    }

    pub fn role(&self) -> CellRole {
        match self.kind {
            CellKind::Element(_) => CellRole::Element,
            CellKind::Link(_) => CellRole::Link,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, CellKind::Element(_))
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, CellKind::Link(_))
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            CellKind::Element(data) => Some(data),
            CellKind::Link(_) => None,
        }
    }

    pub fn as_link(&self) -> Option<&LinkData> {
        match &self.kind {
            CellKind::Link(data) => Some(data),
            CellKind::Element(_) => None,
        }
    }

    pub fn z(&self) -> Option<i64> {
        self.z
    }

    pub fn parent(&self) -> Option<&CellId> {
        self.parent.as_ref()
    }

    pub fn embeds(&self) -> &[CellId] {
        &self.embeds
    }

    pub fn is_embedded(&self) -> bool {
        self.parent.is_some()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn owner(&self) -> Option<GraphId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<GraphId>) {
        self.owner = owner;
    }

    pub(crate) fn set_z_silently(&mut self, z: Option<i64>) {
        self.z = z;
    }

    pub(crate) fn set_id_silently(&mut self, id: CellId) {
        self.id = id;
    }

    /// Reads the value at `path`. Missing paths read as `None`.
    pub fn get(&self, path: impl IntoPropertyPath) -> Result<Option<Value>> {
        let path = path.into_path()?;
        let key = path.key();
        let Some(top) = self.top_value(&key) else {
            return Ok(None);
        };
        Ok(path::get_at(&top, &path.segments()[..1], path.rest())?.cloned())
    }

    /// Typed read of the value at `path`.
    pub fn prop<T: DeserializeOwned>(&self, path: impl IntoPropertyPath) -> Result<Option<T>> {
        let path = path.into_path()?;
        let Some(value) = self.get(&path)? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| Error::InvalidAttribute {
                key: path.to_string(),
                message: err.to_string(),
            })
    }

    /// Replaces the value at `path`, creating missing intermediates.
    pub fn set(
        &mut self,
        path: impl IntoPropertyPath,
        value: Value,
        options: &ChangeOptions,
    ) -> Result<()> {
        let path = path.into_path()?;
        self.update_top(&path.key(), options, |top| {
            path::set_at(top, &path.segments()[..1], path.rest(), value)
        })
    }

    /// Deep-merges objects at `path`. Non-object values are replaced.
    pub fn merge(
        &mut self,
        path: impl IntoPropertyPath,
        value: Value,
        options: &ChangeOptions,
    ) -> Result<()> {
        let path = path.into_path()?;
        self.update_top(&path.key(), options, |top| {
            path::merge_at(top, &path.segments()[..1], path.rest(), &value)
        })
    }

    /// Removes the value at `path`. Removing a missing path does nothing.
    pub fn remove_prop(&mut self, path: impl IntoPropertyPath, options: &ChangeOptions) -> Result<()> {
        let path = path.into_path()?;
        let key = path.key();
        let Some(previous) = self.top_value(&key) else {
            return Ok(());
        };
        if path.rest().is_empty() {
            check_mutable(&key)?;
            self.write_top(&key, None)?;
            self.record(key, Some(previous), options);
            return Ok(());
        }
        let mut top = previous.clone();
        if path::remove_at(&mut top, &path.segments()[..1], path.rest())?.is_none() {
            return Ok(());
        }
        self.write_top(&key, Some(top))?;
        self.record(key, Some(previous), options);
        Ok(())
    }

    /// Applies `f` to the JSON view of a top-level key and writes the result back.
    pub(crate) fn update_top(
        &mut self,
        key: &str,
        options: &ChangeOptions,
        f: impl FnOnce(&mut Value) -> Result<()>,
    ) -> Result<()> {
        check_mutable(key)?;
        let previous = self.top_value(key);
        let mut top = previous.clone().unwrap_or(Value::Null);
        f(&mut top)?;
        self.write_top(key, Some(top))?;
        self.record(key.to_string(), previous, options);
        Ok(())
    }

    fn record(&mut self, key: String, previous: Option<Value>, options: &ChangeOptions) {
        let change = CellChange {
            id: self.id.clone(),
            key,
            previous,
            options: options.clone(),
        };
        if self.owner.is_some() {
            self.pending.push(change);
        } else {
            self.notify(&CellEvent::from(change));
        }
    }

    pub(crate) fn take_pending(&mut self) -> Vec<CellChange> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Registers a per-cell observer.
    pub fn observe(&mut self, f: impl FnMut(&CellEvent) + 'static) -> ObserverId {
        let id = ObserverId(self.observers.next);
        self.observers.next += 1;
        self.observers.list.push((id, Rc::new(RefCell::new(f))));
        id
    }

    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.list.len();
        self.observers.list.retain(|(oid, _)| *oid != id);
        before != self.observers.list.len()
    }

    pub(crate) fn notify(&self, event: &CellEvent) {
        for (_, observer) in &self.observers.list {
            if let Ok(mut f) = observer.try_borrow_mut() {
                f(event);
            }
        }
    }

    /// JSON value of a top-level key. `None` when unset.
    pub(crate) fn top_value(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.id.0.clone())),
            "type" => Some(Value::String(self.cell_type.clone())),
            "z" => self.z.map(Value::from),
            "parent" => self.parent.as_ref().map(|p| Value::String(p.0.clone())),
            "embeds" => (!self.embeds.is_empty()).then(|| {
                Value::Array(
                    self.embeds
                        .iter()
                        .map(|id| Value::String(id.0.clone()))
                        .collect(),
                )
            }),
            _ => match &self.kind {
                CellKind::Element(data) if ElementData::is_key(key) => data.get(key),
                CellKind::Link(data) if LinkData::is_key(key) => data.get(key),
                _ => self.attributes.get(key).cloned(),
            },
        }
    }

    /// Writes a top-level key from JSON. `None` unsets it (typed keys fall back to defaults).
    pub(crate) fn write_top(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        let value = value.filter(|v| !v.is_null() || !is_typed_key(&self.kind, key));
        match key {
            "id" => {
                let Some(value) = value else {
                    return Err(Error::ImmutableAttribute {
                        key: key.to_string(),
                    });
                };
                self.id = decode(key, value)?;
            }
            "type" => match value {
                Some(Value::String(s)) => self.cell_type = s,
                other => {
                    return Err(Error::InvalidAttribute {
                        key: key.to_string(),
                        message: format!("expected a string, got {}", describe(other.as_ref())),
                    });
                }
            },
            "z" => {
                self.z = match value {
                    None => None,
                    Some(v) => Some(decode::<f64>(key, v)?.round() as i64),
                }
            }
            "parent" => {
                self.parent = match value {
                    None => None,
                    Some(v) => Some(decode(key, v)?),
                }
            }
            "embeds" => {
                self.embeds = match value {
                    None => Vec::new(),
                    Some(v) => decode(key, v)?,
                }
            }
            _ => match &mut self.kind {
                CellKind::Element(data) if ElementData::is_key(key) => {
                    data.set(&self.id, key, value)?
                }
                CellKind::Link(data) if LinkData::is_key(key) => data.set(key, value)?,
                _ => match value {
                    Some(v) => {
                        self.attributes.insert(key.to_string(), v);
                    }
                    None => {
                        self.attributes.shift_remove(key);
                    }
                },
            },
        }
        Ok(())
    }

    /// A copy with a fresh id, no parent and no embeds. Observers are not copied.
    pub fn clone_cell(&self) -> Cell {
        Cell {
            id: CellId::generate(),
            cell_type: self.cell_type.clone(),
            z: self.z,
            parent: None,
            embeds: Vec::new(),
            kind: self.kind.clone(),
            attributes: self.attributes.clone(),
            owner: None,
            pending: Vec::new(),
            observers: Observers::default(),
        }
    }

    /// Builds a cell from its flattened JSON form. `id` is generated when missing.
    pub fn from_json(json: &Value, role: CellRole) -> Result<Cell> {
        let Value::Object(map) = json else {
            return Err(Error::InvalidCell {
                message: format!("expected an object, got {}", describe(Some(json))),
            });
        };
        let cell_type = match map.get("type") {
            Some(Value::String(s)) => s.clone(),
            None => match role {
                CellRole::Element => ELEMENT_TYPE.to_string(),
                CellRole::Link => LINK_TYPE.to_string(),
            },
            Some(other) => {
                return Err(Error::InvalidCellType {
                    message: format!("expected a string, got {}", describe(Some(other))),
                });
            }
        };
        let mut cell = match role {
            CellRole::Element => Cell::element(cell_type),
            CellRole::Link => Cell::link(cell_type),
        };
        for (key, value) in map {
            if key == "type" {
                continue;
            }
            cell.write_top(key, Some(value.clone()))?;
        }
        Ok(cell)
    }

    /// Flattened JSON form: `type`, `id`, typed keys, then the remaining attributes.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_string(), Value::String(self.cell_type.clone()));
        out.insert("id".to_string(), Value::String(self.id.0.clone()));
        match &self.kind {
            CellKind::Element(data) => data.write_json(&mut out),
            CellKind::Link(data) => data.write_json(&mut out),
        }
        for key in ["z", "parent", "embeds"] {
            if let Some(v) = self.top_value(key) {
                out.insert(key.to_string(), v);
            }
        }
        for (key, value) in &self.attributes {
            out.insert(key.clone(), value.clone());
        }
        Value::Object(out)
    }
}

fn check_mutable(key: &str) -> Result<()> {
    if key == "id" {
        return Err(Error::ImmutableAttribute {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn is_typed_key(kind: &CellKind, key: &str) -> bool {
    matches!(key, "id" | "type" | "z" | "parent" | "embeds")
        || match kind {
            CellKind::Element(_) => ElementData::is_key(key),
            CellKind::Link(_) => LinkData::is_key(key),
        }
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| Error::InvalidAttribute {
        key: key.to_string(),
        message: err.to_string(),
    })
}

/// JSON number for a coordinate. Integral values are written as integers so that
/// `{"x": 10}` reads back unchanged.
pub(crate) fn json_num(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub(crate) fn json_point(p: Point) -> Value {
    let mut map = Map::new();
    map.insert("x".to_string(), json_num(p.x));
    map.insert("y".to_string(), json_num(p.y));
    Value::Object(map)
}

fn describe(value: Option<&Value>) -> &'static str {
    match value {
        None | Some(Value::Null) => "nothing",
        Some(Value::Bool(_)) => "a boolean",
        Some(Value::Number(_)) => "a number",
        Some(Value::String(_)) => "a string",
        Some(Value::Array(_)) => "an array",
        Some(Value::Object(_)) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_become_strings() {
        let id: CellId = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(id.as_str(), "12");
    }

    #[test]
    fn standalone_changes_reach_observers_immediately() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut cell = Cell::element("standard.Rectangle");
        let sink = Rc::clone(&seen);
        cell.observe(move |event| {
            let CellEvent::Change { key, options, .. } = event;
            sink.borrow_mut().push((key.clone(), options.flag("ui")));
        });
        cell.set("attrs/body/fill", json!("red"), &ChangeOptions::new().with("ui", true))
            .unwrap();
        assert_eq!(*RefCell::borrow(&seen), vec![("attrs".to_string(), true)]);
    }

    #[test]
    fn id_is_immutable() {
        let mut cell = Cell::element("standard.Rectangle");
        let err = cell.set("id", json!("x"), &ChangeOptions::new()).unwrap_err();
        assert!(matches!(err, Error::ImmutableAttribute { .. }));
    }
}
