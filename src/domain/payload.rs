use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::error::{IntakeError, IntakeResult};

/// A normalized change payload: string keys in insertion order.
pub type Payload = Map<String, Value>;

/// Recursively normalize a value: nested maps and lists are rebuilt in
/// order, string leaves are trimmed, other scalars are left untouched.
///
/// Idempotent: `normalize_value(&normalize_value(v)) == normalize_value(v)`.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

pub fn normalize_map(map: &Payload) -> Payload {
    map.iter()
        .map(|(k, v)| (k.clone(), normalize_value(v)))
        .collect()
}

/// Normalize a top-level payload.
///
/// A missing payload (or JSON `null`) stays `None`, so "no prior state" is
/// distinguishable from an empty map. A scalar or list at the top level has
/// no key/value shape and cannot be stored as a payload.
pub fn normalize_payload(value: Option<&Value>) -> IntakeResult<Option<Payload>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(normalize_map(map))),
        Some(other) => Err(IntakeError::Serialization(format!(
            "payload must be a key/value map, got {}",
            kind(other)
        ))),
    }
}

/// Convert any serializable caller value into a payload [`Value`].
///
/// Map keys are stringified by `serde_json`; values it cannot represent
/// (e.g. maps keyed by structs) are a serialization fault.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> IntakeResult<Value> {
    serde_json::to_value(value).map_err(|e| IntakeError::Serialization(e.to_string()))
}

/// Read a field as trimmed, non-blank text. Non-string scalars use their
/// JSON text form.
pub fn extract_string(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Look up `key` in an optional payload and read it with [`extract_string`].
pub fn field(payload: Option<&Payload>, key: &str) -> Option<String> {
    extract_string(payload.and_then(|p| p.get(key)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
