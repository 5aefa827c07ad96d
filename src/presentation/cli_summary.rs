use crate::application::monitoring::PerfReport;
use crate::domain::change_request::{ChangeRequest, ChangeStatus};
use crate::domain::snapshot::ChangeSnapshot;
use colored::*;
use serde_json::Value;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

fn status_cell(status: ChangeStatus) -> String {
    let s = status.as_str();
    match status {
        ChangeStatus::Pending | ChangeStatus::Draft => s.yellow().to_string(),
        ChangeStatus::Approved | ChangeStatus::Applied => s.green().to_string(),
        ChangeStatus::Rejected | ChangeStatus::Failed => s.red().to_string(),
    }
}

fn id_cell(cr: &ChangeRequest) -> String {
    cr.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into())
}

fn value_cell(value: &Value) -> String {
    match value {
        Value::Null => "∅".into(),
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

// ─── Request listing ──────────────────────────────────────────────────────────

#[derive(Tabled)]
struct RequestRow {
    id: String,
    #[tabled(rename = "type")]
    resource_type: String,
    action: String,
    target: String,
    status: String,
    #[tabled(rename = "requested by")]
    requested_by: String,
    #[tabled(rename = "requested at")]
    requested_at: String,
}

/// Print one row per request, oldest first.
pub fn print_requests(requests: &[ChangeRequest]) {
    println!();
    if requests.is_empty() {
        println!("{}", "No change requests.".italic());
        return;
    }

    let rows: Vec<RequestRow> = requests
        .iter()
        .map(|cr| RequestRow {
            id: id_cell(cr).dimmed().to_string(),
            resource_type: cr.resource_type.as_str().bold().to_string(),
            action: cr.action.as_str().to_string(),
            target: cr.resource_id.clone().unwrap_or_default(),
            status: status_cell(cr.status),
            requested_by: cr.requested_by.clone(),
            requested_at: cr.requested_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!("  {} request(s)", requests.len().to_string().bold());
    println!();
}

// ─── Single request ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct FieldRow {
    field: String,
    before: String,
    after: String,
}

/// Print a request header followed by its field-level diff.
pub fn print_request(cr: &ChangeRequest) {
    println!();
    println!(
        "{} {} {}",
        "CHANGE REQUEST".bold().cyan(),
        cr.resource_type.as_str().bold(),
        cr.action.as_str().blue()
    );
    println!("Id:           {}", id_cell(cr).bright_yellow());
    if let Some(target) = &cr.resource_id {
        println!("Target:       {}", target);
    }
    println!("Category:     {}", cr.category);
    println!("Status:       {}", status_cell(cr.status));
    println!(
        "Requested by: {} at {}",
        cr.requested_by,
        cr.requested_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let (Some(by), Some(at)) = (&cr.decided_by, &cr.decided_at) {
        println!("Decided by:   {} at {}", by, at.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(reason) = &cr.reason {
        println!("Reason:       {}", reason.italic());
    }
    if let Some(err) = &cr.last_error {
        println!("Last error:   {}", err.red());
    }
    println!();
    print_diff(&cr.snapshot());
}

/// Print the changed fields of a snapshot as a before/after table.
pub fn print_diff(snapshot: &ChangeSnapshot) {
    if !snapshot.has_changes() {
        println!("{}", "No field changes.".italic());
        println!();
        return;
    }

    let rows: Vec<FieldRow> = snapshot
        .changes()
        .iter()
        .map(|c| FieldRow {
            field: c.field_display().bold().to_string(),
            before: value_cell(&c.before).red().to_string(),
            after: value_cell(&c.after).green().to_string(),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..=0)).with(Alignment::left()))
        .to_string();
    println!("{table}");
    println!();
}

/// Print a rejected draft. The message is meant for the end user as-is.
pub fn print_duplicate(message: &str) {
    eprintln!();
    eprintln!("{}", "DUPLICATE CHANGE REQUEST".bold().red());
    eprintln!("{}", message);
    eprintln!();
}

// ─── Performance summary ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct PerfRow {
    operation: String,
    #[tabled(rename = "type")]
    resource_type: String,
    rows: String,
    #[tabled(rename = "time (ms)")]
    duration_ms: String,
}

/// Print a performance timing table to stdout.
pub fn print_perf_summary(report: &PerfReport) {
    if report.timings.is_empty() {
        return;
    }

    println!("{}", "PERFORMANCE".bold().cyan());

    let rows: Vec<PerfRow> = report
        .timings
        .iter()
        .map(|t| PerfRow {
            operation: t.operation.dimmed().to_string(),
            resource_type: t.resource_type.bold().to_string(),
            rows: t.rows.to_string(),
            duration_ms: format_duration(t.duration_ms),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=3)).with(Alignment::right()))
        .to_string();

    println!("{table}");
    println!(
        "  Total: {} row(s) read  ·  {} ms in store",
        report.total_rows_read.to_string().bold(),
        format_duration(report.total_ms),
    );
    println!();
}

fn format_duration(ms: u128) -> String {
    if ms >= 1_000 {
        format!("{:.1}s", ms as f64 / 1_000.0).yellow().to_string()
    } else if ms >= 100 {
        ms.to_string().yellow().to_string()
    } else {
        ms.to_string().green().to_string()
    }
}
