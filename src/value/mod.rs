//! The dynamic value type threaded through template function arguments,
//! template function results, and native-extension RPC payloads.
//!
//! The dynamic value type threaded through template functions and
//! extension RPCs: null, bool, int, float, string, bytes, sequence, or
//! mapping. `serde_json::Value` has no native `bytes`
//! variant, so [`Value::Bytes`] round-trips as a base64 string tagged
//! with a reserved key — the same "tagged JSON" trick the extension
//! wire protocol already needs for the handshake's `tls_cert` field.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A reserved object key used to tag base64-encoded byte strings when a
/// [`Value`] is serialized to JSON, since JSON itself has no bytes type.
const BYTES_TAG: &str = "$stencilBytes";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(b);
                let mut map = serde_json::Map::new();
                map.insert(BYTES_TAG.to_string(), JsonValue::String(encoded));
                JsonValue::Object(map)
            }
            Value::Sequence(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Mapping(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(obj)
            }
        }
    }

    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::Sequence(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(JsonValue::String(encoded)) = obj.get(BYTES_TAG) {
                        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(encoded) {
                            return Value::Bytes(bytes);
                        }
                    }
                }
                let mut map = BTreeMap::new();
                for (k, v) in obj {
                    map.insert(k.clone(), Value::from_json(v));
                }
                Value::Mapping(map)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Sequence(_) | Value::Mapping(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = JsonValue::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_through_json() {
        for v in [Value::Null, Value::Bool(true), Value::Int(42), Value::String("hi".into())] {
            let json = v.to_json();
            assert_eq!(Value::from_json(&json), v);
        }
    }

    #[test]
    fn round_trips_bytes_through_base64_tag() {
        let v = Value::Bytes(vec![0, 1, 2, 255, 254]);
        let json = v.to_json();
        assert!(json.is_object());
        let back = Value::from_json(&json);
        assert_eq!(back, v);
    }

    #[test]
    fn round_trips_mapping_and_sequence() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("b".to_string(), Value::Sequence(vec![Value::Bool(false)]));
        let v = Value::Mapping(map);
        let json = v.to_json();
        assert_eq!(Value::from_json(&json), v);
    }

    #[test]
    fn display_renders_scalars_bare() {
        assert_eq!(Value::String("x".into()).to_string(), "x");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Null.to_string(), "");
    }
}
