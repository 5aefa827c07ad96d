use crate::domain::{
    change_request::{ChangeRequest, ChangeStatus},
    error::IntakeResult,
    value_objects::ResourceType,
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Port: durable storage of change requests (implemented by
/// SqlxChangeRequestStore and InMemoryChangeRequestStore).
#[async_trait]
pub trait ChangeRequestStore: Send + Sync {
    /// All requests of `resource_type` whose status is one of `statuses`.
    async fn find_active(
        &self,
        resource_type: &ResourceType,
        statuses: &[ChangeStatus],
    ) -> Result<Vec<ChangeRequest>>;

    /// Insert (when `id` is `None`, assigning one) or update a request.
    ///
    /// An insert whose `dedup_key` is already held by another row fails with
    /// [`crate::domain::error::DedupKeyTaken`].
    async fn save(&self, request: ChangeRequest) -> Result<ChangeRequest>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChangeRequest>>;

    /// Requests filtered by type and/or status, oldest first.
    async fn list(
        &self,
        resource_type: Option<&ResourceType>,
        status: Option<ChangeStatus>,
    ) -> Result<Vec<ChangeRequest>>;
}

/// Port: who is asking (implemented by StaticActor, EnvActor)
pub trait ActorResolver: Send + Sync {
    fn current_actor(&self) -> Option<String>;
}

/// Port: storage form of payloads and diffs (implemented by JsonSerializer)
pub trait PayloadSerializer: Send + Sync {
    fn to_storage_form(&self, value: &Value) -> IntakeResult<String>;
    /// Best-effort read; `None` when the text is blank or unreadable.
    fn from_storage_form(&self, text: &str) -> Option<Value>;
}

/// Port: does an approval item reference this change request?
///
/// Optional. When wired in, conflicting candidates that no approval item
/// references are treated as orphans and voided instead of blocking.
#[async_trait]
pub trait ApprovalLinkage: Send + Sync {
    async fn is_referenced(&self, change_request_id: Uuid) -> Result<bool>;
}
