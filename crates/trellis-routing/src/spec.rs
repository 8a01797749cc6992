//! Named strategy descriptors (`{ name, args }`) and the argument value types they carry.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A strategy reference as stored on links and paper defaults.
///
/// Accepts either a bare name (`"manhattan"`) or an object (`{"name": "manhattan", "args": {..}}`).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSpec {
    pub name: String,
    pub args: Value,
}

impl NamedSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Value::Object(Map::new()),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Deserializes `args` into a typed option struct.
    pub fn options<T: DeserializeOwned>(&self) -> Result<T> {
        options_from_args(&self.name, &self.args, None)
    }

    /// Like [`NamedSpec::options`], with `args` deep-merged over `defaults` first.
    pub fn options_over<T: DeserializeOwned>(&self, defaults: &Value) -> Result<T> {
        options_from_args(&self.name, &self.args, Some(defaults))
    }
}

impl Serialize for NamedSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        let has_args = match &self.args {
            Value::Object(m) => !m.is_empty(),
            Value::Null => false,
            _ => true,
        };
        if has_args {
            map.insert("args".to_string(), self.args.clone());
        }
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NamedSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Full {
                name: String,
                #[serde(default)]
                args: Option<Value>,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Name(name) => NamedSpec::new(name),
            Raw::Full { name, args } => NamedSpec {
                name,
                args: args.unwrap_or_else(|| Value::Object(Map::new())),
            },
        })
    }
}

impl From<&str> for NamedSpec {
    fn from(name: &str) -> Self {
        NamedSpec::new(name)
    }
}

pub(crate) fn options_from_args<T: DeserializeOwned>(
    name: &str,
    args: &Value,
    defaults: Option<&Value>,
) -> Result<T> {
    let mut merged = defaults
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    match args {
        Value::Null => {}
        Value::Object(_) => deep_merge(&mut merged, args),
        other => {
            return Err(Error::InvalidOption {
                name: name.to_string(),
                message: format!("expected an object of arguments, got {other}"),
            });
        }
    }
    serde_json::from_value(merged).map_err(|err| Error::InvalidOption {
        name: name.to_string(),
        message: err.to_string(),
    })
}

/// Recursively merges `incoming` into `base`. Objects merge key by key, everything else is
/// replaced.
pub fn deep_merge(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

/// A length that is either absolute or a percentage of a reference extent (`"50%"`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Absolute(f64),
    Percent(f64),
}

impl Dimension {
    pub fn resolve(self, extent: f64) -> f64 {
        match self {
            Dimension::Absolute(v) => v,
            Dimension::Percent(p) => p / 100.0 * extent,
        }
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Dimension::Absolute(v) => serializer.serialize_f64(*v),
            Dimension::Percent(p) => serializer.serialize_str(&format!("{p}%")),
        }
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Dimension::Absolute(v)),
            Raw::Text(s) => {
                let s = s.trim();
                let (body, percent) = match s.strip_suffix('%') {
                    Some(body) => (body, true),
                    None => (s, false),
                };
                let v: f64 = body
                    .trim()
                    .parse()
                    .map_err(|_| serde::de::Error::custom(format!("invalid dimension `{s}`")))?;
                Ok(if percent {
                    Dimension::Percent(v)
                } else {
                    Dimension::Absolute(v)
                })
            }
        }
    }
}

/// Connection point offset: a distance along the link, or `{x, y}` where `x` runs along the
/// link and `y` shifts sideways.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Offset {
    Along(f64),
    Xy {
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },
}

impl Default for Offset {
    fn default() -> Self {
        Offset::Along(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn named_spec_accepts_bare_names() {
        let spec: NamedSpec = serde_json::from_value(json!("metro")).unwrap();
        assert_eq!(spec.name, "metro");
        assert_eq!(spec.args, json!({}));
        assert_eq!(serde_json::to_value(&spec).unwrap(), json!({"name": "metro"}));
    }

    #[test]
    fn args_merge_over_defaults() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        deep_merge(&mut base, &json!({"a": {"c": 3}, "d": [9]}));
        assert_eq!(base, json!({"a": {"b": 1, "c": 3}, "d": [9]}));
    }

    #[test]
    fn dimensions_parse_percentages() {
        let d: Dimension = serde_json::from_value(json!("25%")).unwrap();
        assert_eq!(d.resolve(200.0), 50.0);
        let d: Dimension = serde_json::from_value(json!("12")).unwrap();
        assert_eq!(d, Dimension::Absolute(12.0));
    }
}
