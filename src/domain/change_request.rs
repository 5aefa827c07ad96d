use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::payload::{normalize_payload, Payload};
use crate::domain::snapshot::ChangeSnapshot;
use crate::domain::value_objects::{Action, ResourceType};

/// Lifecycle state of a change request.
///
/// Intake only ever creates `Pending` requests; the other transitions are
/// owned by the approval side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Applied,
    Failed,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Draft => "DRAFT",
            ChangeStatus::Pending => "PENDING",
            ChangeStatus::Approved => "APPROVED",
            ChangeStatus::Rejected => "REJECTED",
            ChangeStatus::Applied => "APPLIED",
            ChangeStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for ChangeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_uppercase().as_str() {
            "DRAFT" => ChangeStatus::Draft,
            "PENDING" => ChangeStatus::Pending,
            "APPROVED" => ChangeStatus::Approved,
            "REJECTED" => ChangeStatus::Rejected,
            "APPLIED" => ChangeStatus::Applied,
            "FAILED" => ChangeStatus::Failed,
            other => bail!("Unknown change request status: {}", other),
        })
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI grouping of a request, derived once from its resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    UserManagement,
    RoleManagement,
    MenuManagement,
    SystemConfig,
    Organization,
    CustomRole,
    RoleAssignment,
    General,
}

impl Category {
    pub fn for_resource(resource_type: &ResourceType) -> Self {
        match resource_type.as_str() {
            ResourceType::USER => Category::UserManagement,
            ResourceType::ROLE => Category::RoleManagement,
            ResourceType::PORTAL_MENU => Category::MenuManagement,
            ResourceType::CONFIG => Category::SystemConfig,
            ResourceType::ORG => Category::Organization,
            ResourceType::CUSTOM_ROLE => Category::CustomRole,
            ResourceType::ROLE_ASSIGNMENT => Category::RoleAssignment,
            _ => Category::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::UserManagement => "USER_MANAGEMENT",
            Category::RoleManagement => "ROLE_MANAGEMENT",
            Category::MenuManagement => "MENU_MANAGEMENT",
            Category::SystemConfig => "SYSTEM_CONFIG",
            Category::Organization => "ORGANIZATION",
            Category::CustomRole => "CUSTOM_ROLE",
            Category::RoleAssignment => "ROLE_ASSIGNMENT",
            Category::General => "GENERAL",
        }
    }

    /// Read a stored category. Unrecognised text reads as `General`.
    pub fn parse(s: &str) -> Self {
        [
            Category::UserManagement,
            Category::RoleManagement,
            Category::MenuManagement,
            Category::SystemConfig,
            Category::Organization,
            Category::CustomRole,
            Category::RoleAssignment,
        ]
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
        .unwrap_or(Category::General)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed mutation to a governed resource, awaiting a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    /// Assigned by the store on first save.
    pub id: Option<Uuid>,
    pub resource_type: ResourceType,
    pub action: Action,
    pub resource_id: Option<String>,
    /// Normalized "after" payload in storage form; `None` when the request
    /// carried no payload.
    pub payload_json: Option<String>,
    /// `{before, after, changes}` snapshot in storage form.
    pub diff_json: Option<String>,
    pub status: ChangeStatus,
    pub category: Category,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub last_error: Option<String>,
    /// Hash of the resource fingerprint while the request is active; backs
    /// the storage-level uniqueness of active requests.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dedup_key: Option<String>,
}

impl ChangeRequest {
    /// The stored payload, best-effort: unreadable text reads as no payload.
    pub fn payload(&self) -> Option<Payload> {
        let text = self.payload_json.as_deref()?;
        let value: Value = serde_json::from_str(text).ok()?;
        normalize_payload(Some(&value)).ok().flatten()
    }

    /// The stored diff. Rows written without one get a create-style diff
    /// rebuilt from the stored payload.
    pub fn snapshot(&self) -> ChangeSnapshot {
        match self.diff_json.as_deref() {
            Some(text) => ChangeSnapshot::from_json(text),
            None => ChangeSnapshot::from_json_pair(None, self.payload_json.as_deref()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChangeStatus::Pending
    }

    /// The dedup key as it should be stored: only a pending request holds one.
    pub fn active_dedup_key(&self) -> Option<&str> {
        self.dedup_key.as_deref().filter(|_| self.is_pending())
    }

    /// Move the request out of (or back into) the pending state.
    ///
    /// Leaving `Pending` releases the dedup key so a new request for the same
    /// resource can be drafted.
    pub fn decide(&mut self, status: ChangeStatus, decided_by: &str, error: Option<String>) {
        self.status = status;
        self.decided_by = Some(decided_by.to_string());
        self.decided_at = Some(Utc::now());
        self.last_error = error;
        if status != ChangeStatus::Pending {
            self.dedup_key = None;
        }
    }
}
