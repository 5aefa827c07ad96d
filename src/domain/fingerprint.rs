use crate::domain::payload::{field, Payload};
use crate::domain::value_objects::{normalize_resource_id, Fingerprint, ResourceType};

/// Compute the logical identity of the resource a request targets.
///
/// Precedence:
/// 1. A non-blank `resource_id` wins: `TYPE::<lower(id)>`.
/// 2. Otherwise a type-specific payload field:
///    - `PORTAL_MENU` → `TYPE::path::<lower(path)>`, else `TYPE::name::<lower(name)>`
///    - `ROLE`        → `TYPE::<upper(name or role)>`
///    - `USER`        → `TYPE::<lower(username)>`
/// 3. Anything else has no fingerprint (`None`), and `None` never matches.
///
/// A request carrying both an id and a contradicting payload identity is
/// fingerprinted by the id alone.
pub fn fingerprint(
    resource_type: &ResourceType,
    resource_id: Option<&str>,
    payload: Option<&Payload>,
) -> Option<Fingerprint> {
    let ty = resource_type.as_str();
    if let Some(id) = normalize_resource_id(resource_id) {
        return Some(Fingerprint(format!("{}::{}", ty, id.to_lowercase())));
    }
    let payload = payload.filter(|p| !p.is_empty())?;

    let fp = match ty {
        ResourceType::PORTAL_MENU => {
            if let Some(path) = field(Some(payload), "path") {
                format!("{}::path::{}", ty, path.to_lowercase())
            } else {
                let name = field(Some(payload), "name")?;
                format!("{}::name::{}", ty, name.to_lowercase())
            }
        }
        ResourceType::ROLE => {
            let name = field(Some(payload), "name").or_else(|| field(Some(payload), "role"))?;
            format!("{}::{}", ty, name.to_uppercase())
        }
        ResourceType::USER => {
            let username = field(Some(payload), "username")?;
            format!("{}::{}", ty, username.to_lowercase())
        }
        _ => return None,
    };
    Some(Fingerprint(fp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn payload(v: Value) -> Payload {
        v.as_object().cloned().unwrap_or_default()
    }

    fn ty(s: &str) -> ResourceType {
        ResourceType::normalize(Some(s))
    }

    fn fp(s: &str) -> Option<Fingerprint> {
        Some(Fingerprint(s.to_string()))
    }

    #[test]
    fn resource_id_takes_priority() {
        let p = payload(json!({"username": "bob"}));
        assert_eq!(fingerprint(&ty("USER"), Some(" Alice "), Some(&p)), fp("USER::alice"));
    }

    #[test]
    fn menu_prefers_path_then_name() {
        let with_path = payload(json!({"path": "/Reports/Sales", "name": "Sales"}));
        assert_eq!(
            fingerprint(&ty("PORTAL_MENU"), None, Some(&with_path)),
            fp("PORTAL_MENU::path::/reports/sales")
        );
        let name_only = payload(json!({"path": "  ", "name": "Sales"}));
        assert_eq!(
            fingerprint(&ty("PORTAL_MENU"), None, Some(&name_only)),
            fp("PORTAL_MENU::name::sales")
        );
        let neither = payload(json!({"title": "Sales"}));
        assert_eq!(fingerprint(&ty("PORTAL_MENU"), None, Some(&neither)), None);
    }

    #[test]
    fn role_is_upper_cased_and_falls_back_to_role_field() {
        let by_name = payload(json!({"name": "auditor"}));
        assert_eq!(fingerprint(&ty("ROLE"), None, Some(&by_name)), fp("ROLE::AUDITOR"));
        let by_role = payload(json!({"role": "ops_admin"}));
        assert_eq!(fingerprint(&ty("ROLE"), None, Some(&by_role)), fp("ROLE::OPS_ADMIN"));
    }

    #[test]
    fn user_uses_username() {
        let p = payload(json!({"username": "Carol", "email": "c@x.com"}));
        assert_eq!(fingerprint(&ty("USER"), None, Some(&p)), fp("USER::carol"));
        let p = payload(json!({"email": "c@x.com"}));
        assert_eq!(fingerprint(&ty("USER"), None, Some(&p)), None);
    }

    #[test]
    fn other_types_only_fingerprint_by_id() {
        let p = payload(json!({"name": "finance"}));
        assert_eq!(fingerprint(&ty("ORG"), None, Some(&p)), None);
        assert_eq!(fingerprint(&ty("ORG"), Some("42"), Some(&p)), fp("ORG::42"));
    }

    #[test]
    fn empty_or_missing_payload_has_no_fingerprint() {
        assert_eq!(fingerprint(&ty("USER"), None, None), None);
        assert_eq!(fingerprint(&ty("USER"), Some("  "), Some(&Payload::new())), None);
    }
}
