use serde::Serialize;
use serde_json::Value;

use crate::domain::error::IntakeResult;
use crate::domain::payload::to_payload;

/// The raw inputs of a draft, exactly as a caller hands them over.
///
/// Nothing here is normalized yet; every field may be missing or blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftRequest {
    pub resource_type: Option<String>,
    pub action: Option<String>,
    pub resource_id: Option<String>,
    pub after: Option<Value>,
    pub before: Option<Value>,
    pub reason: Option<String>,
}

impl DraftRequest {
    pub fn new(resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn after(mut self, payload: Value) -> Self {
        self.after = Some(payload);
        self
    }

    pub fn before(mut self, payload: Value) -> Self {
        self.before = Some(payload);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the "after" state from any serializable value (a DTO, a map, …).
    pub fn after_from<T: Serialize + ?Sized>(self, payload: &T) -> IntakeResult<Self> {
        Ok(self.after(to_payload(payload)?))
    }

    /// Set the "before" state from any serializable value.
    pub fn before_from<T: Serialize + ?Sized>(self, payload: &T) -> IntakeResult<Self> {
        Ok(self.before(to_payload(payload)?))
    }
}
