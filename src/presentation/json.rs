use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::application::monitoring::PerfReport;
use crate::domain::change_request::ChangeRequest;

// ─── Serialisation view types ─────────────────────────────────────────────────
//
// Stored requests carry payload and diff as text; these views expand both
// into JSON so consumers don't have to parse strings inside strings.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRequest<'a> {
    #[serde(flatten)]
    request: &'a ChangeRequest,
    payload: Option<Value>,
    diff: Value,
}

#[derive(Serialize)]
struct JsonListing<'a> {
    requests: Vec<JsonRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    perf: Option<&'a PerfReport>,
}

fn view(cr: &ChangeRequest) -> JsonRequest<'_> {
    JsonRequest {
        request: cr,
        payload: cr.payload().map(Value::Object),
        diff: cr.snapshot().to_value(),
    }
}

/// Pretty JSON for a single request, payload and diff expanded.
pub fn render_request(cr: &ChangeRequest) -> Result<String> {
    Ok(serde_json::to_string_pretty(&view(cr))?)
}

/// Pretty JSON for a listing, with store timings when collected.
pub fn render_requests(requests: &[ChangeRequest], perf: Option<&PerfReport>) -> Result<String> {
    let listing = JsonListing {
        requests: requests.iter().map(view).collect(),
        perf,
    };
    Ok(serde_json::to_string_pretty(&listing)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change_request::{Category, ChangeStatus};
    use crate::domain::value_objects::{Action, ResourceType};
    use chrono::Utc;

    fn request() -> ChangeRequest {
        ChangeRequest {
            id: None,
            resource_type: ResourceType::normalize(Some("ROLE")),
            action: Action::normalize(Some("CREATE")),
            resource_id: None,
            payload_json: Some(r#"{"name":"auditor"}"#.into()),
            diff_json: None,
            status: ChangeStatus::Pending,
            category: Category::RoleManagement,
            requested_by: "alice".into(),
            requested_at: Utc::now(),
            decided_by: None,
            decided_at: None,
            reason: None,
            last_error: None,
            dedup_key: None,
        }
    }

    #[test]
    fn expands_payload_and_derives_missing_diff() {
        let out: Value = serde_json::from_str(&render_request(&request()).unwrap()).unwrap();
        assert_eq!(out["resourceType"], "ROLE");
        assert_eq!(out["payload"]["name"], "auditor");
        assert_eq!(out["payloadJson"], r#"{"name":"auditor"}"#);
        assert_eq!(out["diff"]["changes"][0]["field"], "name");
        assert_eq!(out["diff"]["changes"][0]["before"], Value::Null);
    }

    #[test]
    fn listing_omits_perf_when_absent() {
        let out: Value =
            serde_json::from_str(&render_requests(&[request()], None).unwrap()).unwrap();
        assert_eq!(out["requests"].as_array().map(Vec::len), Some(1));
        assert!(out.get("perf").is_none());
    }
}
