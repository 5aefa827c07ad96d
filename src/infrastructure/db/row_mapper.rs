use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};
use uuid::Uuid;

use crate::domain::change_request::{Category, ChangeRequest};
use crate::domain::value_objects::{Action, ResourceType};

/// Columns of `change_request`, in the order used by every SELECT and INSERT.
pub const COLUMNS: &[&str] = &[
    "id",
    "resource_type",
    "resource_id",
    "action",
    "payload_json",
    "diff_json",
    "status",
    "category",
    "requested_by",
    "requested_at",
    "decided_by",
    "decided_at",
    "reason",
    "last_error",
    "dedup_key",
];

/// Timestamps are stored as fixed-width RFC 3339 text so that they sort
/// lexically on every engine.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw.trim())
        .with_context(|| format!("Invalid timestamp in change_request: {}", raw))?
        .with_timezone(&Utc))
}

/// Read a nullable text column. MySQL may hand TEXT columns to `AnyRow` as
/// BLOB depending on collation, so both representations are accepted.
fn opt_text(row: &AnyRow, name: &str) -> Result<Option<String>> {
    let idx = row
        .columns()
        .iter()
        .position(|c| c.name() == name)
        .with_context(|| format!("Column {} missing from change_request row", name))?;
    if row.column(idx).type_info().name() == "BLOB" {
        let bytes: Option<Vec<u8>> = row.try_get(idx)?;
        return Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()));
    }
    Ok(row.try_get(idx)?)
}

fn text(row: &AnyRow, name: &str) -> Result<String> {
    opt_text(row, name)?.with_context(|| format!("Column {} is unexpectedly NULL", name))
}

/// Convert a sqlx `AnyRow` from `change_request` into a [`ChangeRequest`].
pub fn row_to_request(row: &AnyRow) -> Result<ChangeRequest> {
    let id = text(row, "id")?;
    let id = Uuid::parse_str(id.trim()).with_context(|| format!("Invalid id: {}", id))?;

    Ok(ChangeRequest {
        id: Some(id),
        resource_type: ResourceType(text(row, "resource_type")?),
        action: Action(text(row, "action")?),
        resource_id: opt_text(row, "resource_id")?,
        payload_json: opt_text(row, "payload_json")?,
        diff_json: opt_text(row, "diff_json")?,
        status: text(row, "status")?.parse()?,
        category: Category::parse(&text(row, "category")?),
        requested_by: text(row, "requested_by")?,
        requested_at: parse_timestamp(&text(row, "requested_at")?)?,
        decided_by: opt_text(row, "decided_by")?,
        decided_at: opt_text(row, "decided_at")?
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        reason: opt_text(row, "reason")?,
        last_error: opt_text(row, "last_error")?,
        dedup_key: opt_text(row, "dedup_key")?,
    })
}

/// Bind values for [`COLUMNS`], in order.
pub fn request_to_params(id: Uuid, r: &ChangeRequest) -> Vec<Option<String>> {
    vec![
        Some(id.to_string()),
        Some(r.resource_type.as_str().to_string()),
        r.resource_id.clone(),
        Some(r.action.as_str().to_string()),
        r.payload_json.clone(),
        r.diff_json.clone(),
        Some(r.status.as_str().to_string()),
        Some(r.category.as_str().to_string()),
        Some(r.requested_by.clone()),
        Some(format_timestamp(&r.requested_at)),
        r.decided_by.clone(),
        r.decided_at.as_ref().map(format_timestamp),
        r.reason.clone(),
        r.last_error.clone(),
        r.active_dedup_key().map(str::to_string),
    ]
}
