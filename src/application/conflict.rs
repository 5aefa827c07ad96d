use crate::domain::change_request::ChangeRequest;
use crate::domain::fingerprint::fingerprint;
use crate::domain::payload::{field, Payload};
use crate::domain::value_objects::{normalize_resource_id, Fingerprint, ResourceType};

// ─────────────────────────────────────────────────────────────────────────────
// ConflictCheck
// ─────────────────────────────────────────────────────────────────────────────

/// Decides whether an active request blocks a new draft.
///
/// # Algorithm
/// A candidate conflicts when **any** of these hold:
/// 1. **id**: both resource ids are present and equal, ignoring case.
/// 2. **fingerprint**: the draft's fingerprint matches the one rebuilt from
///    the candidate's id and stored payload (see [`fingerprint`]). A missing
///    fingerprint on either side never matches.
/// 3. **raw payload**: neither side has a resource id and the stored payload
///    strings are byte-for-byte identical.
///
/// Read-only: evaluating a candidate never touches storage.
pub struct ConflictCheck<'a> {
    resource_type: &'a ResourceType,
    resource_id: Option<&'a str>,
    payload: Option<&'a Payload>,
    payload_json: Option<&'a str>,
    fingerprint: Option<Fingerprint>,
}

impl<'a> ConflictCheck<'a> {
    pub fn new(
        resource_type: &'a ResourceType,
        resource_id: Option<&'a str>,
        payload: Option<&'a Payload>,
        payload_json: Option<&'a str>,
    ) -> Self {
        Self {
            resource_type,
            resource_id,
            payload,
            payload_json,
            fingerprint: fingerprint(resource_type, resource_id, payload),
        }
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    /// `existing_payload` is the candidate's stored payload, already read
    /// back from storage form.
    pub fn conflicts_with(
        &self,
        existing: &ChangeRequest,
        existing_payload: Option<&Payload>,
    ) -> bool {
        let existing_id = normalize_resource_id(existing.resource_id.as_deref());
        matches_by_id(self.resource_id, existing_id.as_deref())
            || self.matches_by_fingerprint(existing_id.as_deref(), existing_payload)
            || matches_by_payload(
                self.resource_id,
                existing_id.as_deref(),
                self.payload_json,
                existing.payload_json.as_deref(),
            )
    }

    fn matches_by_fingerprint(
        &self,
        existing_id: Option<&str>,
        existing_payload: Option<&Payload>,
    ) -> bool {
        let Some(fp) = &self.fingerprint else {
            return false;
        };
        fingerprint(self.resource_type, existing_id, existing_payload)
            .is_some_and(|other| fp.matches(&other))
    }

    /// User-facing message naming the blocked resource.
    ///
    /// The identifier is, in order: the draft's resource id, a field of the
    /// draft's payload (or, if that is empty, the candidate's), then a generic
    /// sentence.
    pub fn duplicate_message(&self, existing_payload: Option<&Payload>) -> String {
        duplicate_message(
            self.resource_type,
            self.resource_id,
            self.payload,
            existing_payload,
        )
    }
}

fn matches_by_id(requested: Option<&str>, existing: Option<&str>) -> bool {
    match (non_blank(requested), non_blank(existing)) {
        (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
        _ => false,
    }
}

fn matches_by_payload(
    requested_id: Option<&str>,
    existing_id: Option<&str>,
    payload_json: Option<&str>,
    existing_json: Option<&str>,
) -> bool {
    if non_blank(requested_id).is_some() || non_blank(existing_id).is_some() {
        return false;
    }
    matches!((payload_json, existing_json), (Some(a), Some(b)) if a == b)
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub const GENERIC_DUPLICATE_MESSAGE: &str =
    "An identical change is already pending approval; wait for it to be decided before resubmitting";

pub fn duplicate_message(
    resource_type: &ResourceType,
    resource_id: Option<&str>,
    payload: Option<&Payload>,
    existing_payload: Option<&Payload>,
) -> String {
    let payload = payload.filter(|p| !p.is_empty()).or(existing_payload);
    let id = || non_blank(resource_id).map(str::to_string);

    let (label, identifier) = match resource_type.as_str() {
        ResourceType::USER => ("User", id().or_else(|| field(payload, "username"))),
        ResourceType::ROLE => (
            "Role",
            id().or_else(|| field(payload, "name"))
                .or_else(|| field(payload, "role"))
                .map(|r| r.to_uppercase()),
        ),
        ResourceType::PORTAL_MENU => (
            "Menu",
            id().or_else(|| field(payload, "path"))
                .or_else(|| field(payload, "name")),
        ),
        _ => return GENERIC_DUPLICATE_MESSAGE.to_string(),
    };

    match identifier {
        Some(identifier) => format!(
            "{} [{}] already has a pending change; wait for it to be decided before resubmitting",
            label,
            identifier.trim()
        ),
        None => GENERIC_DUPLICATE_MESSAGE.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
