//! `/`-delimited attribute paths over JSON values.
//!
//! Key segments address object members and, when they parse as non-negative integers, array
//! items. Index segments address array items and object members named by their decimal string.
//! Writing through a missing or `null` intermediate creates it: an array when the next segment
//! is numeric, an object otherwise.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use trellis_routing::spec::deep_merge;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(k) => k.parse().ok(),
        }
    }

    fn as_key(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }

    fn empty_container(&self) -> Value {
        if self.as_index().is_some() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Key(value.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

/// A non-empty attribute path. The first segment is the top-level attribute key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidPath {
                message: "empty path".to_string(),
            });
        }
        Self::from_segments(path.split('/').map(PathSegment::from))
    }

    pub fn from_segments(segments: impl IntoIterator<Item = PathSegment>) -> Result<Self> {
        let segments: Vec<PathSegment> = segments.into_iter().collect();
        if segments.is_empty() {
            return Err(Error::InvalidPath {
                message: "empty path".to_string(),
            });
        }
        if segments
            .iter()
            .any(|s| matches!(s, PathSegment::Key(k) if k.is_empty()))
        {
            return Err(Error::InvalidPath {
                message: format!("empty segment in `{}`", join(&segments)),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The top-level attribute this path starts at.
    pub fn key(&self) -> String {
        self.segments[0].as_key()
    }

    /// Segments below the top-level key.
    pub fn rest(&self) -> &[PathSegment] {
        &self.segments[1..]
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.segments))
    }
}

impl FromStr for PropertyPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn join(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Anything accepted where a path is expected.
pub trait IntoPropertyPath {
    fn into_path(self) -> Result<PropertyPath>;
}

impl IntoPropertyPath for PropertyPath {
    fn into_path(self) -> Result<PropertyPath> {
        Ok(self)
    }
}

impl IntoPropertyPath for &PropertyPath {
    fn into_path(self) -> Result<PropertyPath> {
        Ok(self.clone())
    }
}

impl IntoPropertyPath for &str {
    fn into_path(self) -> Result<PropertyPath> {
        PropertyPath::parse(self)
    }
}

impl IntoPropertyPath for String {
    fn into_path(self) -> Result<PropertyPath> {
        PropertyPath::parse(&self)
    }
}

impl IntoPropertyPath for Vec<PathSegment> {
    fn into_path(self) -> Result<PropertyPath> {
        PropertyPath::from_segments(self)
    }
}

impl IntoPropertyPath for &[PathSegment] {
    fn into_path(self) -> Result<PropertyPath> {
        PropertyPath::from_segments(self.iter().cloned())
    }
}

fn mismatch(traversed: &[PathSegment], segment: &PathSegment) -> Error {
    Error::PathTypeMismatch {
        path: join(traversed),
        segment: segment.to_string(),
    }
}

/// Reads below `root`. `prefix` is only used for error messages.
pub(crate) fn get_at<'a>(
    root: &'a Value,
    prefix: &[PathSegment],
    segments: &[PathSegment],
) -> Result<Option<&'a Value>> {
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        current = match current {
            Value::Object(map) => match map.get(&segment.as_key()) {
                Some(v) => v,
                None => return Ok(None),
            },
            Value::Array(items) => match segment.as_index().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return Ok(None),
            },
            Value::Null => return Ok(None),
            _ => {
                let traversed: Vec<PathSegment> =
                    prefix.iter().chain(&segments[..i]).cloned().collect();
                return Err(mismatch(&traversed, segment));
            }
        };
    }
    Ok(Some(current))
}

fn slot<'a>(
    current: &'a mut Value,
    traversed: &[PathSegment],
    segment: &PathSegment,
) -> Result<&'a mut Value> {
    if current.is_null() {
        *current = segment.empty_container();
    }
    match current {
        Value::Object(map) => Ok(map.entry(segment.as_key()).or_insert(Value::Null)),
        Value::Array(items) => {
            let Some(index) = segment.as_index() else {
                return Err(mismatch(traversed, segment));
            };
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            Ok(&mut items[index])
        }
        _ => Err(mismatch(traversed, segment)),
    }
}

fn walk_mut<'a>(
    root: &'a mut Value,
    prefix: &[PathSegment],
    segments: &[PathSegment],
) -> Result<&'a mut Value> {
    let mut current = root;
    let mut traversed: Vec<PathSegment> = prefix.to_vec();
    for segment in segments {
        current = slot(current, &traversed, segment)?;
        traversed.push(segment.clone());
    }
    Ok(current)
}

/// Replaces the value below `root`, creating intermediates.
pub(crate) fn set_at(
    root: &mut Value,
    prefix: &[PathSegment],
    segments: &[PathSegment],
    value: Value,
) -> Result<()> {
    *walk_mut(root, prefix, segments)? = value;
    Ok(())
}

/// Deep-merges objects below `root`. Anything else is replaced.
pub(crate) fn merge_at(
    root: &mut Value,
    prefix: &[PathSegment],
    segments: &[PathSegment],
    value: &Value,
) -> Result<()> {
    let target = walk_mut(root, prefix, segments)?;
    if target.is_object() && value.is_object() {
        deep_merge(target, value);
    } else {
        *target = value.clone();
    }
    Ok(())
}

/// Removes the value below `root`. Array items are spliced out.
pub(crate) fn remove_at(
    root: &mut Value,
    prefix: &[PathSegment],
    segments: &[PathSegment],
) -> Result<Option<Value>> {
    let Some((last, parents)) = segments.split_last() else {
        return Ok(None);
    };
    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        current = match current {
            Value::Object(map) => match map.get_mut(&segment.as_key()) {
                Some(v) => v,
                None => return Ok(None),
            },
            Value::Array(items) => match segment.as_index().and_then(|i| items.get_mut(i)) {
                Some(v) => v,
                None => return Ok(None),
            },
            Value::Null => return Ok(None),
            _ => {
                let traversed: Vec<PathSegment> =
                    prefix.iter().chain(&parents[..i]).cloned().collect();
                return Err(mismatch(&traversed, segment));
            }
        };
    }
    Ok(match current {
        Value::Object(map) => map.shift_remove(&last.as_key()),
        Value::Array(items) => match last.as_index() {
            Some(i) if i < items.len() => Some(items.remove(i)),
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segs(path: &str) -> Vec<PathSegment> {
        PropertyPath::parse(path).unwrap().segments().to_vec()
    }

    #[test]
    fn numeric_segments_create_arrays() {
        let mut root = Value::Null;
        set_at(&mut root, &[], &segs("a/0/b"), json!(1)).unwrap();
        assert_eq!(root, json!({"a": [{"b": 1}]}));
    }

    #[test]
    fn index_segments_address_objects_by_string() {
        let root = json!({"a": {"2": "x"}});
        let v = get_at(&root, &[], &[PathSegment::from("a"), PathSegment::from(2)]).unwrap();
        assert_eq!(v, Some(&json!("x")));
    }

    #[test]
    fn traversing_a_scalar_is_an_error() {
        let mut root = json!({"a": 5});
        let err = set_at(&mut root, &[], &segs("a/b"), json!(1)).unwrap_err();
        assert!(matches!(err, Error::PathTypeMismatch { .. }), "{err}");
        assert!(get_at(&root, &[], &segs("a/b")).is_err());
    }

    #[test]
    fn removing_array_items_splices() {
        let mut root = json!({"a": [1, 2, 3]});
        let removed = remove_at(&mut root, &[], &segs("a/1")).unwrap();
        assert_eq!(removed, Some(json!(2)));
        assert_eq!(root, json!({"a": [1, 3]}));
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert!(PropertyPath::parse("").is_err());
        assert!(PropertyPath::parse("a//b").is_err());
        assert!(PropertyPath::from_segments(Vec::new()).is_err());
    }
}
