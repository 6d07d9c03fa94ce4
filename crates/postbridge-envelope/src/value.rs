//! Values crossing the bridge.
//!
//! The channel carries JSON, so the boundary is lossy: anything that is not
//! a primitive or plain structured data (live object references, callbacks,
//! unresolved asynchronous results) can only cross as an [`OpaqueRef`]
//! handle describing it. The receiving side cannot dereference such a handle.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// Assignable property value: string, number or boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl PropertyValue {
    /// Returns `None` for NaN and infinities, which JSON cannot carry.
    pub fn from_f64(value: f64) -> Option<Self> {
        Number::from_f64(value).map(PropertyValue::Number)
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Number(n) => Value::Number(n.clone()),
            PropertyValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value.into())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

/// Handle standing in for a value that cannot be serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpaqueRef {
    #[serde(rename = "$ref")]
    pub handle: String,
}

impl OpaqueRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }
}

/// Result payload of a remote operation.
///
/// `Structured` holds objects and arrays; build values with
/// [`RemoteValue::from_json`] to keep the variants canonical. Deserializing
/// goes through the same classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RemoteValue {
    Null,
    Primitive(PropertyValue),
    Opaque(OpaqueRef),
    Structured(Value),
}

impl RemoteValue {
    /// Classify a JSON value into its canonical variant.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => RemoteValue::Null,
            Value::Bool(b) => RemoteValue::Primitive(PropertyValue::Bool(b)),
            Value::Number(n) => RemoteValue::Primitive(PropertyValue::Number(n)),
            Value::String(s) => RemoteValue::Primitive(PropertyValue::Text(s)),
            Value::Object(map) => match map.get("$ref") {
                Some(Value::String(handle)) if map.len() == 1 => {
                    RemoteValue::Opaque(OpaqueRef::new(handle.clone()))
                }
                _ => RemoteValue::Structured(Value::Object(map)),
            },
            other => RemoteValue::Structured(other),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RemoteValue::Null => Value::Null,
            RemoteValue::Primitive(p) => p.to_json(),
            RemoteValue::Opaque(r) => serde_json::json!({ "$ref": r.handle }),
            RemoteValue::Structured(v) => v.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RemoteValue::Null)
    }
}

impl<'de> Deserialize<'de> for RemoteValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(RemoteValue::from_json)
    }
}

impl From<PropertyValue> for RemoteValue {
    fn from(value: PropertyValue) -> Self {
        RemoteValue::Primitive(value)
    }
}

impl From<Value> for RemoteValue {
    fn from(value: Value) -> Self {
        RemoteValue::from_json(value)
    }
}
