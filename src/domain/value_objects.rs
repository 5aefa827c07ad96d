use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Literal stored when a header field is missing or blank.
pub const UNKNOWN: &str = "UNKNOWN";

/// Trim and upper-case a header value; blank or missing input becomes [`UNKNOWN`].
fn normalize_header(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Upper-cased kind of the governed resource (`USER`, `ROLE`, `PORTAL_MENU`, …).
///
/// Any input is accepted: values outside the known set are kept verbatim
/// (upper-cased) and simply fall into the `GENERAL` category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(pub String);

impl ResourceType {
    pub const USER: &'static str = "USER";
    pub const ROLE: &'static str = "ROLE";
    pub const PORTAL_MENU: &'static str = "PORTAL_MENU";
    pub const CONFIG: &'static str = "CONFIG";
    pub const ORG: &'static str = "ORG";
    pub const CUSTOM_ROLE: &'static str = "CUSTOM_ROLE";
    pub const ROLE_ASSIGNMENT: &'static str = "ROLE_ASSIGNMENT";

    pub fn normalize(raw: Option<&str>) -> Self {
        Self(normalize_header(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Menu resources travel under a few aliases depending on the caller.
    pub fn is_portal_menu(&self) -> bool {
        matches!(
            self.0.as_str(),
            "PORTAL_MENU" | "MENU" | "MENU_MANAGEMENT"
        )
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Upper-cased verb of a change request (`CREATE`, `UPDATE`, `DELETE`, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(pub String);

impl Action {
    pub fn normalize(raw: Option<&str>) -> Self {
        Self(normalize_header(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Trim a resource identifier. Never yields an empty string.
pub fn normalize_resource_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Logical identity of the resource a change request targets.
///
/// Built by [`crate::domain::fingerprint::fingerprint`]. Two requests with
/// matching fingerprints (case-insensitively) address the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Returns the raw fingerprint text, e.g. `USER::alice`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison, the only equality the dedup check uses.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }

    /// SHA-256 hex of the lower-cased fingerprint.
    ///
    /// Stored in the unique `dedup_key` column of active requests so the
    /// storage layer rejects a second active request for the same resource
    /// even when two drafts race past the in-process check.
    pub fn dedup_key(&self) -> String {
        let hash = Sha256::digest(self.0.to_lowercase().as_bytes());
        format!("{:x}", hash)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
