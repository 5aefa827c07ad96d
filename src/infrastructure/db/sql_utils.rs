use crate::infrastructure::db::dialect::QueryDialect;
use crate::infrastructure::db::row_mapper::COLUMNS;

pub const TABLE: &str = "change_request";

// ─────────────────────────────────────────────────────────────────────────────
// Query builders
// ─────────────────────────────────────────────────────────────────────────────

fn select_prefix() -> String {
    format!("SELECT {} FROM {}", COLUMNS.join(", "), TABLE)
}

/// `INSERT INTO change_request (...) VALUES (...)` binding every column.
pub fn build_insert_query(dialect: &dyn QueryDialect) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        TABLE,
        COLUMNS.join(", "),
        dialect.placeholders(1, COLUMNS.len())
    )
}

/// `UPDATE` of every column but `id`, keyed on `id`.
///
/// Binds the columns in [`COLUMNS`] order with `id` moved last.
pub fn build_update_query(dialect: &dyn QueryDialect) -> String {
    let assignments: Vec<String> = COLUMNS[1..]
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = {}", col, dialect.placeholder(i + 1)))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE id = {}",
        TABLE,
        assignments.join(", "),
        dialect.placeholder(COLUMNS.len())
    )
}

pub fn build_find_by_id_query(dialect: &dyn QueryDialect) -> String {
    format!("{} WHERE id = {}", select_prefix(), dialect.placeholder(1))
}

/// Requests of one type whose status is one of `status_count` bound values.
/// Binds the type first, then the statuses.
pub fn build_find_active_query(dialect: &dyn QueryDialect, status_count: usize) -> String {
    format!(
        "{} WHERE resource_type = {} AND status IN ({}) ORDER BY requested_at",
        select_prefix(),
        dialect.placeholder(1),
        dialect.placeholders(2, status_count)
    )
}

/// Optional type and status filters, oldest first. Binds the type (when
/// filtered) before the status.
pub fn build_list_query(dialect: &dyn QueryDialect, by_type: bool, by_status: bool) -> String {
    let mut clauses = Vec::new();
    let mut n = 0;
    if by_type {
        n += 1;
        clauses.push(format!("resource_type = {}", dialect.placeholder(n)));
    }
    if by_status {
        n += 1;
        clauses.push(format!("status = {}", dialect.placeholder(n)));
    }
    if clauses.is_empty() {
        format!("{} ORDER BY requested_at", select_prefix())
    } else {
        format!(
            "{} WHERE {} ORDER BY requested_at",
            select_prefix(),
            clauses.join(" AND ")
        )
    }
}
