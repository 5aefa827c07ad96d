use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::payload::{normalize_map, Payload};

/// One field whose value differs between the before and after states.
///
/// A side where the field is absent is reported as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

impl FieldChange {
    /// Field name for display: underscores become spaces, lower-cased.
    pub fn field_display(&self) -> String {
        self.field.replace('_', " ").to_lowercase()
    }
}

/// Field-level diff between two normalized payloads.
///
/// Stored alongside a change request as `{before, after, changes}` and read
/// back by approval screens. Pure: no state, no I/O.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChangeSnapshot {
    before: Payload,
    after: Payload,
    changes: Vec<FieldChange>,
}

impl ChangeSnapshot {
    /// Compute the diff. A missing side is diffed as an empty map.
    ///
    /// `changes` follows the insertion order of the key union: every key of
    /// `before` first, then the keys only `after` has.
    pub fn of(before: Option<&Payload>, after: Option<&Payload>) -> Self {
        let before = before.map(normalize_map).unwrap_or_default();
        let after = after.map(normalize_map).unwrap_or_default();
        let changes = compute_changes(&before, &after);
        Self {
            before,
            after,
            changes,
        }
    }

    pub fn before(&self) -> &Payload {
        &self.before
    }

    pub fn after(&self) -> &Payload {
        &self.after
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Storage shape: `{before, after, changes: [{field, before, after}, ...]}`.
    pub fn to_value(&self) -> Value {
        let changes: Vec<Value> = self
            .changes
            .iter()
            .map(|c| json!({"field": c.field, "before": c.before, "after": c.after}))
            .collect();
        json!({
            "before": Value::Object(self.before.clone()),
            "after": Value::Object(self.after.clone()),
            "changes": changes,
        })
    }

    /// Rebuild a snapshot from the [`to_value`](Self::to_value) shape.
    ///
    /// Non-map `before`/`after` read as empty maps. When `changes` is missing
    /// or empty it is recomputed from the two sides; entries without a
    /// `field` are skipped.
    pub fn from_value(raw: &Value) -> Self {
        let map = match raw.as_object() {
            Some(map) if !map.is_empty() => map,
            _ => return Self::default(),
        };
        let before = as_payload(map.get("before"));
        let after = as_payload(map.get("after"));
        let mut changes = parse_changes(map.get("changes"));
        if changes.is_empty() {
            changes = compute_changes(&before, &after);
        }
        Self {
            before,
            after,
            changes,
        }
    }

    /// Parse a stored diff. Blank or unreadable text yields an empty snapshot.
    pub fn from_json(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str::<Value>(text)
            .map(|v| Self::from_value(&v))
            .unwrap_or_default()
    }

    /// Rebuild a snapshot from two stored payload strings, for requests that
    /// carry no stored diff.
    pub fn from_json_pair(before: Option<&str>, after: Option<&str>) -> Self {
        let before = read_payload(before);
        let after = read_payload(after);
        Self::of(Some(&before), Some(&after))
    }
}

fn compute_changes(before: &Payload, after: &Payload) -> Vec<FieldChange> {
    let null = Value::Null;
    before
        .keys()
        .chain(after.keys().filter(|k| !before.contains_key(k.as_str())))
        .filter_map(|field| {
            let left = before.get(field).unwrap_or(&null);
            let right = after.get(field).unwrap_or(&null);
            (left != right).then(|| FieldChange {
                field: field.clone(),
                before: left.clone(),
                after: right.clone(),
            })
        })
        .collect()
}

fn as_payload(value: Option<&Value>) -> Payload {
    match value {
        Some(Value::Object(map)) => normalize_map(map),
        _ => Payload::new(),
    }
}

fn parse_changes(value: Option<&Value>) -> Vec<FieldChange> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let field = match entry.get("field")? {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(FieldChange {
                field,
                before: entry.get("before").cloned().unwrap_or(Value::Null),
                after: entry.get("after").cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}

fn read_payload(text: Option<&str>) -> Payload {
    text.filter(|t| !t.trim().is_empty())
        .and_then(|t| serde_json::from_str::<Value>(t).ok())
        .map(|v| as_payload(Some(&v)))
        .unwrap_or_default()
}
