//! Metadata value model.
//!
//! Incoming metadata is dynamically typed JSON. It is converted once, at
//! parse time, into [`MetadataValue`] so downstream stages only ever see
//! nulls, scalars, and flat lists of scalars.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Metadata exactly as it arrived on the input line.
pub type RawMetadata = BTreeMap<String, MetadataValue>;

/// Metadata in the shape vector stores accept.
pub type NormalizedMetadata = BTreeMap<String, Scalar>;

/// A storage-safe metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    fn from_number(n: &serde_json::Number) -> Self {
        match n.as_i64() {
            Some(i) => Scalar::Int(i),
            // u64 beyond i64::MAX and all fractional values
            None => Scalar::Float(n.as_f64().unwrap_or_default()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => Value::from(*f),
            Scalar::String(s) => Value::String(s.clone()),
        }
    }
}

/// Floats render in JSON form so `1.0` stays distinct from the integer `1`.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", Value::from(*x)),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// One raw metadata value.
///
/// List elements are `None` where the input held `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Null,
    Scalar(Scalar),
    List(Vec<Option<Scalar>>),
}

impl MetadataValue {
    /// String form used when this value becomes a document id.
    ///
    /// Returns `None` for null.
    pub fn to_id_string(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            MetadataValue::Scalar(s) => Some(s.to_string()),
            MetadataValue::List(items) => {
                let json: Vec<Value> = items
                    .iter()
                    .map(|item| item.as_ref().map_or(Value::Null, Scalar::to_json))
                    .collect();
                Some(Value::Array(json).to_string())
            }
        }
    }
}

/// Scalars pass through; nested containers collapse to their compact JSON text.
fn element_from_json(value: Value) -> Option<Scalar> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Scalar::Bool(b)),
        Value::Number(n) => Some(Scalar::from_number(&n)),
        Value::String(s) => Some(Scalar::String(s)),
        nested @ (Value::Array(_) | Value::Object(_)) => Some(Scalar::String(nested.to_string())),
    }
}

impl From<Value> for MetadataValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => MetadataValue::Null,
            Value::Array(items) => {
                MetadataValue::List(items.into_iter().map(element_from_json).collect())
            }
            other => element_from_json(other).map_or(MetadataValue::Null, MetadataValue::Scalar),
        }
    }
}

/// Convert a JSON object into raw metadata.
pub fn raw_metadata_from_json(map: serde_json::Map<String, Value>) -> RawMetadata {
    map.into_iter()
        .map(|(key, value)| (key, MetadataValue::from(value)))
        .collect()
}
