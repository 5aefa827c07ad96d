use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn, Span};

use crate::application::conflict::ConflictCheck;
use crate::application::diff::build_diff;
use crate::domain::change_request::{Category, ChangeRequest, ChangeStatus};
use crate::domain::draft::DraftRequest;
use crate::domain::error::{DedupKeyTaken, IntakeError, IntakeResult};
use crate::domain::payload::{normalize_payload, Payload};
use crate::domain::ports::{ActorResolver, ApprovalLinkage, ChangeRequestStore, PayloadSerializer};
use crate::domain::value_objects::{normalize_resource_id, Action, Fingerprint, ResourceType};
use crate::infrastructure::config::IntakeConfig;
use crate::infrastructure::serializer::JsonSerializer;

/// Statuses that make a request "active" for duplicate detection.
pub const ACTIVE_STATUSES: &[ChangeStatus] = &[ChangeStatus::Pending];

const ORPHAN_ERROR: &str = "missing approval reference; voided automatically";

/// Fallback identity for voiding orphans when no actor is resolvable.
const ORPHAN_DECIDER: &str = "system";

// ─── Policy ───

/// Which resource types are deduplicated and who acts when nobody is logged in.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakePolicy {
    pub dedup_types: Vec<ResourceType>,
    pub system_actor: String,
}

impl IntakePolicy {
    pub fn deduplicates(&self, resource_type: &ResourceType) -> bool {
        self.dedup_types.contains(resource_type)
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self::from(&IntakeConfig::default())
    }
}

impl From<&IntakeConfig> for IntakePolicy {
    fn from(cfg: &IntakeConfig) -> Self {
        Self {
            dedup_types: cfg
                .dedup_types
                .iter()
                .map(|t| ResourceType::normalize(Some(t)))
                .collect(),
            system_actor: cfg.system_actor.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChangeRequestService
// ─────────────────────────────────────────────────────────────────────────────

/// Accepts proposed changes to governed resources and records them as
/// pending change requests.
///
/// # Pipeline
/// 1. Normalize both payloads and the `type` / `action` / `id` headers.
/// 2. Serialize the "after" payload and the field-level diff.
/// 3. For deduplicated types, reject the draft when an active request
///    already targets the same logical resource ([`ConflictCheck`]).
/// 4. Persist a `PENDING` request through the store port.
///
/// The duplicate check only reads. A draft it rejects with
/// [`IntakeError::DuplicateConflict`] has written nothing, so the caller
/// decides what happens to any surrounding unit of work.
///
/// The in-process check alone is not safe under concurrent writers; the
/// `dedup_key` written with each active request lets the store's unique
/// index reject the loser of a race, which surfaces as the same
/// `DuplicateConflict`. By then the orphans found during the scan have
/// already been voided, and they stay voided.
pub struct ChangeRequestService {
    store: Arc<dyn ChangeRequestStore>,
    actor: Arc<dyn ActorResolver>,
    serializer: Arc<dyn PayloadSerializer>,
    linkage: Option<Arc<dyn ApprovalLinkage>>,
    policy: IntakePolicy,
}

impl ChangeRequestService {
    pub fn new(
        store: Arc<dyn ChangeRequestStore>,
        actor: Arc<dyn ActorResolver>,
        policy: IntakePolicy,
    ) -> Self {
        Self {
            store,
            actor,
            serializer: Arc::new(JsonSerializer),
            linkage: None,
            policy,
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn PayloadSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Void conflicting candidates that no approval item references instead
    /// of letting them block new drafts.
    pub fn with_approval_linkage(mut self, linkage: Arc<dyn ApprovalLinkage>) -> Self {
        self.linkage = Some(linkage);
        self
    }

    pub fn policy(&self) -> &IntakePolicy {
        &self.policy
    }

    /// Record a new pending change request.
    #[instrument(
        name = "draft",
        skip(self, request),
        fields(resource_type = tracing::field::Empty, action = tracing::field::Empty),
        level = "info"
    )]
    pub async fn draft(&self, request: DraftRequest) -> IntakeResult<ChangeRequest> {
        let after = normalize_payload(request.after.as_ref())?;
        let before = normalize_payload(request.before.as_ref())?;

        let resource_type = ResourceType::normalize(request.resource_type.as_deref());
        let action = Action::normalize(request.action.as_deref());
        let resource_id = normalize_resource_id(request.resource_id.as_deref());
        Span::current()
            .record("resource_type", resource_type.as_str())
            .record("action", action.as_str());
        debug!(resource_id = ?resource_id, has_before = before.is_some(), "normalized draft");

        let payload_json = self.write_payload(after.as_ref())?;
        let snapshot = build_diff(&resource_type, before.as_ref(), after.as_ref());
        let diff_json = self.serializer.to_storage_form(&snapshot.to_value())?;

        let check = ConflictCheck::new(
            &resource_type,
            resource_id.as_deref(),
            after.as_ref(),
            payload_json.as_deref(),
        );
        let orphans = self.enforce_no_duplicate(&check, &resource_type).await?;
        self.void_orphans(orphans).await?;

        let dedup_key = if self.policy.deduplicates(&resource_type) {
            check.fingerprint().map(Fingerprint::dedup_key)
        } else {
            None
        };
        let race_message = check.duplicate_message(None);

        let cr = ChangeRequest {
            id: None,
            category: Category::for_resource(&resource_type),
            resource_type,
            action,
            resource_id,
            payload_json,
            diff_json: Some(diff_json),
            status: ChangeStatus::Pending,
            requested_by: self
                .actor
                .current_actor()
                .unwrap_or_else(|| self.policy.system_actor.clone()),
            requested_at: Utc::now(),
            decided_by: None,
            decided_at: None,
            reason: request.reason,
            last_error: None,
            dedup_key,
        };

        match self.store.save(cr).await {
            Ok(saved) => {
                info!(
                    id = ?saved.id,
                    category = %saved.category,
                    changes = snapshot.changes().len(),
                    requested_by = %saved.requested_by,
                    "change request drafted"
                );
                Ok(saved)
            }
            Err(err) if err.is::<DedupKeyTaken>() => {
                warn!(message = %race_message, "concurrent duplicate rejected by store");
                Err(IntakeError::DuplicateConflict {
                    message: race_message,
                    existing_id: None,
                })
            }
            Err(err) => Err(IntakeError::Store(err)),
        }
    }

    /// Run the duplicate check for an already serialized payload without
    /// recording anything.
    ///
    /// Returns the canonical (normalized, re-serialized) payload, or the
    /// input text when it could not be read as a payload.
    #[instrument(name = "ensure_no_duplicate", skip(self, payload_json), level = "debug")]
    pub async fn ensure_no_duplicate(
        &self,
        resource_type: Option<&str>,
        action: Option<&str>,
        resource_id: Option<&str>,
        payload_json: Option<&str>,
    ) -> IntakeResult<Option<String>> {
        let resource_type = ResourceType::normalize(resource_type);
        let action = Action::normalize(action);
        let resource_id = normalize_resource_id(resource_id);
        debug!(%resource_type, %action, resource_id = ?resource_id, "checking serialized payload");

        let payload = self.read_payload(payload_json);
        let canonical = self.write_payload(payload.as_ref())?;

        let check = ConflictCheck::new(
            &resource_type,
            resource_id.as_deref(),
            payload.as_ref(),
            canonical.as_deref(),
        );
        let orphans = self.enforce_no_duplicate(&check, &resource_type).await?;
        self.void_orphans(orphans).await?;

        Ok(canonical.or_else(|| payload_json.map(str::to_string)))
    }

    /// Scan the active requests of `resource_type`.
    ///
    /// Returns the orphaned candidates that would otherwise have conflicted;
    /// voiding them is left to the caller so that a scan ending in a
    /// conflict performs no writes.
    async fn enforce_no_duplicate(
        &self,
        check: &ConflictCheck<'_>,
        resource_type: &ResourceType,
    ) -> IntakeResult<Vec<ChangeRequest>> {
        if !self.policy.deduplicates(resource_type) {
            return Ok(Vec::new());
        }
        let actives = self.store.find_active(resource_type, ACTIVE_STATUSES).await?;
        debug!(candidates = actives.len(), fingerprint = ?check.fingerprint(), "scanning active requests");

        let mut orphans = Vec::new();
        for existing in actives {
            let existing_payload = self.read_payload(existing.payload_json.as_deref());
            if !check.conflicts_with(&existing, existing_payload.as_ref()) {
                continue;
            }
            if self.is_orphaned(&existing).await? {
                orphans.push(existing);
                continue;
            }
            let message = check.duplicate_message(existing_payload.as_ref());
            warn!(existing_id = ?existing.id, %message, "duplicate change request rejected");
            return Err(IntakeError::DuplicateConflict {
                message,
                existing_id: existing.id,
            });
        }
        Ok(orphans)
    }

    async fn is_orphaned(&self, existing: &ChangeRequest) -> IntakeResult<bool> {
        match (&self.linkage, existing.id) {
            (Some(linkage), Some(id)) => Ok(!linkage.is_referenced(id).await?),
            _ => Ok(false),
        }
    }

    async fn void_orphans(&self, orphans: Vec<ChangeRequest>) -> IntakeResult<()> {
        if orphans.is_empty() {
            return Ok(());
        }
        let decider = self
            .actor
            .current_actor()
            .unwrap_or_else(|| ORPHAN_DECIDER.to_string());
        for mut orphan in orphans {
            orphan.decide(ChangeStatus::Failed, &decider, Some(ORPHAN_ERROR.to_string()));
            let saved = self.store.save(orphan).await?;
            warn!(id = ?saved.id, "change request voided: no approval item references it");
        }
        Ok(())
    }

    fn write_payload(&self, payload: Option<&Payload>) -> IntakeResult<Option<String>> {
        payload
            .map(|p| self.serializer.to_storage_form(&Value::Object(p.clone())))
            .transpose()
    }

    fn read_payload(&self, text: Option<&str>) -> Option<Payload> {
        let value = self.serializer.from_storage_form(text?)?;
        normalize_payload(Some(&value)).ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::actor::StaticActor;
    use crate::infrastructure::memory::InMemoryChangeRequestStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    fn service(store: Arc<InMemoryChangeRequestStore>) -> ChangeRequestService {
        ChangeRequestService::new(store, Arc::new(StaticActor::anonymous()), IntakePolicy::default())
    }

    struct NoApprovals;

    #[async_trait]
    impl ApprovalLinkage for NoApprovals {
        async fn is_referenced(&self, _id: Uuid) -> Result<bool> {
            Ok(false)
        }
    }

    struct AllApproved;

    #[async_trait]
    impl ApprovalLinkage for AllApproved {
        async fn is_referenced(&self, _id: Uuid) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn headers_are_canonicalized() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store));

        let cr = svc
            .draft(DraftRequest {
                resource_type: Some(" config ".into()),
                action: None,
                resource_id: Some("   ".into()),
                ..DraftRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(cr.resource_type.as_str(), "CONFIG");
        assert_eq!(cr.action.as_str(), "UNKNOWN");
        assert_eq!(cr.resource_id, None);
        assert_eq!(cr.payload_json, None);
        assert_eq!(cr.requested_by, "sysadmin");
        assert_eq!(cr.last_error, None);
        assert!(cr.id.is_some());
    }

    #[tokio::test]
    async fn duplicate_check_skips_non_pending() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store));

        let mut first = svc
            .draft(DraftRequest::new("USER", "create").resource_id("alice"))
            .await
            .unwrap();
        first.decide(ChangeStatus::Approved, "reviewer", None);
        store.save(first).await.unwrap();

        assert!(svc
            .draft(DraftRequest::new("USER", "update").resource_id("alice"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn conflict_reports_existing_id_and_writes_nothing() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store));

        let first = svc
            .draft(DraftRequest::new("ROLE", "create").after(json!({"name": "auditor"})))
            .await
            .unwrap();
        let err = svc
            .draft(DraftRequest::new("role", "update").after(json!({"role": "AUDITOR"})))
            .await
            .unwrap_err();

        match err {
            IntakeError::DuplicateConflict {
                message,
                existing_id,
            } => {
                assert_eq!(existing_id, first.id);
                assert!(message.contains("[AUDITOR]"), "{message}");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn orphaned_candidates_are_voided() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store));
        let first = svc
            .draft(DraftRequest::new("USER", "create").resource_id("alice"))
            .await
            .unwrap();

        let svc = service(Arc::clone(&store)).with_approval_linkage(Arc::new(NoApprovals));
        let second = svc
            .draft(DraftRequest::new("USER", "update").resource_id("alice"))
            .await
            .unwrap();

        let voided = store.find_by_id(first.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(voided.status, ChangeStatus::Failed);
        assert_eq!(voided.decided_by.as_deref(), Some("system"));
        assert_eq!(voided.last_error.as_deref(), Some(ORPHAN_ERROR));
        assert!(second.is_pending());
    }

    /// Lets updates through but refuses every insert, as the store does for
    /// the loser of a concurrent draft.
    struct InsertsLoseRace(Arc<InMemoryChangeRequestStore>);

    #[async_trait]
    impl ChangeRequestStore for InsertsLoseRace {
        async fn find_active(
            &self,
            resource_type: &ResourceType,
            statuses: &[ChangeStatus],
        ) -> Result<Vec<ChangeRequest>> {
            self.0.find_active(resource_type, statuses).await
        }

        async fn save(&self, request: ChangeRequest) -> Result<ChangeRequest> {
            match (request.id, &request.dedup_key) {
                (None, Some(key)) => Err(DedupKeyTaken {
                    dedup_key: key.clone(),
                }
                .into()),
                _ => self.0.save(request).await,
            }
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<ChangeRequest>> {
            self.0.find_by_id(id).await
        }

        async fn list(
            &self,
            resource_type: Option<&ResourceType>,
            status: Option<ChangeStatus>,
        ) -> Result<Vec<ChangeRequest>> {
            self.0.list(resource_type, status).await
        }
    }

    #[tokio::test]
    async fn lost_race_keeps_orphans_voided() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let first = service(Arc::clone(&store))
            .draft(DraftRequest::new("USER", "create").resource_id("alice"))
            .await
            .unwrap();

        let racer = ChangeRequestService::new(
            Arc::new(InsertsLoseRace(Arc::clone(&store))),
            Arc::new(StaticActor::anonymous()),
            IntakePolicy::default(),
        )
        .with_approval_linkage(Arc::new(NoApprovals));
        let err = racer
            .draft(DraftRequest::new("USER", "update").resource_id("alice"))
            .await
            .unwrap_err();

        match err {
            IntakeError::DuplicateConflict { existing_id, .. } => assert_eq!(existing_id, None),
            other => panic!("expected duplicate conflict, got {other:?}"),
        }
        let voided = store.find_by_id(first.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(voided.status, ChangeStatus::Failed);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn referenced_candidates_still_block() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store)).with_approval_linkage(Arc::new(AllApproved));
        svc.draft(DraftRequest::new("USER", "create").resource_id("alice"))
            .await
            .unwrap();
        let err = svc
            .draft(DraftRequest::new("USER", "update").resource_id("alice"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn ensure_no_duplicate_returns_canonical_payload() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store));

        let canonical = svc
            .ensure_no_duplicate(Some("user"), Some("create"), None, Some(r#"{ "username" : " bob " }"#))
            .await
            .unwrap();
        assert_eq!(canonical.as_deref(), Some(r#"{"username":"bob"}"#));

        let passthrough = svc
            .ensure_no_duplicate(Some("user"), Some("create"), None, Some("not json"))
            .await
            .unwrap();
        assert_eq!(passthrough.as_deref(), Some("not json"));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn ensure_no_duplicate_detects_conflicts() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store));
        svc.draft(DraftRequest::new("USER", "create").after(json!({"username": "bob"})))
            .await
            .unwrap();

        let err = svc
            .ensure_no_duplicate(Some("USER"), Some("update"), Some("BOB"), None)
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn scalar_payload_is_rejected_before_any_read() {
        let store = Arc::new(InMemoryChangeRequestStore::new());
        let svc = service(Arc::clone(&store));
        let err = svc
            .draft(DraftRequest::new("USER", "create").after(json!("bob")))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Serialization(_)));
        assert_eq!(store.len(), 0);
    }
}
