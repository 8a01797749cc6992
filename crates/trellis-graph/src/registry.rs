//! Cell type registry: maps a namespaced `type` to its role and default attributes.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde_json::{Value, json};
use trellis_routing::spec::deep_merge;

use crate::cell::{Cell, CellRole, LINK_TYPE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct CellDefinition {
    pub role: CellRole,
    /// Attributes the JSON of a new cell is merged over.
    pub defaults: Value,
}

#[derive(Debug, Clone)]
pub struct CellRegistry {
    types: IndexMap<String, CellDefinition, FxBuildHasher>,
}

impl Default for CellRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(LINK_TYPE, CellRole::Link, json!({}));
        registry.register(
            "standard.Link",
            CellRole::Link,
            json!({"attrs": {"line": {"stroke": "#333333", "strokeWidth": 2}}}),
        );
        for name in [
            "standard.Rectangle",
            "standard.Circle",
            "standard.Ellipse",
            "standard.Path",
            "standard.Polygon",
        ] {
            registry.register(
                name,
                CellRole::Element,
                json!({"attrs": {"body": {"fill": "#ffffff", "stroke": "#333333", "strokeWidth": 2}}}),
            );
        }
        for name in ["standard.Image", "standard.TextBlock"] {
            registry.register(name, CellRole::Element, json!({}));
        }
        registry
    }
}

impl CellRegistry {
    pub fn empty() -> Self {
        Self {
            types: IndexMap::default(),
        }
    }

    /// Registers (or replaces) a type.
    pub fn register(&mut self, cell_type: &str, role: CellRole, defaults: Value) {
        self.types
            .insert(cell_type.to_string(), CellDefinition { role, defaults });
    }

    pub fn get(&self, cell_type: &str) -> Option<&CellDefinition> {
        self.types.get(cell_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Builds a cell from JSON.
    ///
    /// Unknown types become generic elements, or generic links when the JSON has a `source` or a
    /// `target`.
    pub fn create(&self, json: &Value) -> Result<Cell> {
        let Value::Object(map) = json else {
            return Err(Error::InvalidCell {
                message: "a cell must be a JSON object".to_string(),
            });
        };
        let cell_type = match map.get("type") {
            Some(Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(Error::InvalidCellType {
                    message: "cell type must be a string".to_string(),
                });
            }
            None => {
                return Err(Error::InvalidCellType {
                    message: "cell type is missing".to_string(),
                });
            }
        };
        match self.types.get(cell_type) {
            Some(def) => {
                let mut merged = def.defaults.clone();
                if !merged.is_object() {
                    merged = json!({});
                }
                deep_merge(&mut merged, json);
                Cell::from_json(&merged, def.role)
            }
            None => {
                let role = if map.contains_key("source") || map.contains_key("target") {
                    CellRole::Link
                } else {
                    CellRole::Element
                };
                tracing::debug!(cell_type, ?role, "unregistered cell type");
                Cell::from_json(json, role)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_fall_back_by_shape() {
        let registry = CellRegistry::default();
        let link = registry
            .create(&json!({"type": "app.Edge", "source": {"id": "a"}}))
            .unwrap();
        assert!(link.is_link());
        let element = registry.create(&json!({"type": "app.Node"})).unwrap();
        assert!(element.is_element());
        assert_eq!(element.cell_type(), "app.Node");
    }

    #[test]
    fn defaults_sit_under_the_given_attributes() {
        let registry = CellRegistry::default();
        let link = registry
            .create(&json!({"type": "standard.Link", "attrs": {"line": {"stroke": "red"}}}))
            .unwrap();
        assert_eq!(
            link.get("attrs/line").unwrap(),
            Some(json!({"stroke": "red", "strokeWidth": 2}))
        );
    }

    #[test]
    fn non_string_types_are_rejected() {
        let err = CellRegistry::default()
            .create(&json!({"type": 3}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCellType { .. }));
    }
}
