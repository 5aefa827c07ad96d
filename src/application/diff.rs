use serde_json::Value;

use crate::domain::payload::Payload;
use crate::domain::snapshot::ChangeSnapshot;
use crate::domain::value_objects::ResourceType;

// ─── Menu context ───

/// Identifying fields a menu diff always carries, so reviewers can tell
/// which menu a role-only change touches.
const MENU_CONTEXT_FIELDS: &[&str] = &[
    "id",
    "name",
    "path",
    "displayName",
    "title",
    "menuTitle",
    "menuName",
    "menuLabel",
    "metadata",
];

const MENU_ROLE_FIELDS: &[&str] = &["allowedRoles", "visibilityRules"];

/// Build the stored diff for a draft.
///
/// For menu resources the "after" side first inherits identifying context
/// (and, when it carries none of its own, the role fields) from "before".
/// This shapes the diff only; payload and fingerprint use the raw "after".
pub fn build_diff(
    resource_type: &ResourceType,
    before: Option<&Payload>,
    after: Option<&Payload>,
) -> ChangeSnapshot {
    let before = before.cloned().unwrap_or_default();
    let mut after = after.cloned().unwrap_or_default();

    if resource_type.is_portal_menu() {
        copy_missing(&mut after, &before, MENU_CONTEXT_FIELDS);
        if has_any(&before, MENU_ROLE_FIELDS) && !has_any(&after, MENU_ROLE_FIELDS) {
            copy_absent(&mut after, &before, MENU_ROLE_FIELDS);
        }
    }

    ChangeSnapshot::of(Some(&before), Some(&after))
}

/// Copy `keys` from `fallback` where `target` lacks them or holds `null`.
fn copy_missing(target: &mut Payload, fallback: &Payload, keys: &[&str]) {
    for key in keys {
        let missing = matches!(target.get(*key), None | Some(Value::Null));
        if missing {
            if let Some(v) = fallback.get(*key) {
                target.insert((*key).to_string(), v.clone());
            }
        }
    }
}

/// Copy `keys` from `fallback` where `target` lacks them entirely.
fn copy_absent(target: &mut Payload, fallback: &Payload, keys: &[&str]) {
    for key in keys {
        if !target.contains_key(*key) {
            if let Some(v) = fallback.get(*key) {
                target.insert((*key).to_string(), v.clone());
            }
        }
    }
}

fn has_any(payload: &Payload, keys: &[&str]) -> bool {
    keys.iter().any(|k| payload.contains_key(*k))
}
