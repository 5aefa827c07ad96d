use serde_json::Value;

use crate::domain::error::{IntakeError, IntakeResult};
use crate::domain::ports::PayloadSerializer;

/// Compact JSON storage form. Key order is preserved, so a normalized
/// payload always serializes to the same text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl PayloadSerializer for JsonSerializer {
    fn to_storage_form(&self, value: &Value) -> IntakeResult<String> {
        serde_json::to_string(value).map_err(|e| IntakeError::Serialization(e.to_string()))
    }

    fn from_storage_form(&self, text: &str) -> Option<Value> {
        if text.trim().is_empty() {
            return None;
        }
        serde_json::from_str(text).ok()
    }
}
