// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// SQL dialect: placeholders and schema DDL for the `change_request` table.
///
/// `sqlx::Any` forwards SQL text untouched, so anything that differs per
/// driver has to be spelled out here.
pub trait QueryDialect: Send + Sync {
    /// Return the driver name as a lowercase string ("postgres", "mysql", …).
    fn name(&self) -> &'static str;

    /// Bind placeholder for the `n`-th (1-based) parameter.
    /// - PostgreSQL → `$n`
    /// - MySQL / MariaDB / SQLite → `?`
    fn placeholder(&self, n: usize) -> String;

    /// Statements creating the table and its indexes; each is idempotent.
    fn schema_statements(&self) -> &'static [&'static str];

    /// `count` comma-separated placeholders numbered from `start`.
    fn placeholders(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// The unique index on `dedup_key` is what makes duplicate detection safe
// under concurrent drafts: NULL keys (inactive or non-deduplicated rows)
// never collide on any of the supported engines.

const PORTABLE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS change_request (
        id VARCHAR(36) PRIMARY KEY,
        resource_type TEXT NOT NULL,
        resource_id TEXT,
        action TEXT NOT NULL,
        payload_json TEXT,
        diff_json TEXT,
        status VARCHAR(32) NOT NULL,
        category VARCHAR(64) NOT NULL,
        requested_by TEXT NOT NULL,
        requested_at VARCHAR(40) NOT NULL,
        decided_by TEXT,
        decided_at VARCHAR(40),
        reason TEXT,
        last_error TEXT,
        dedup_key VARCHAR(64)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_change_request_dedup_key \
     ON change_request (dedup_key)",
    "CREATE INDEX IF NOT EXISTS ix_change_request_type_status \
     ON change_request (resource_type, status)",
];

// MySQL has no `CREATE INDEX IF NOT EXISTS`; keys are declared inline.
// An indexed column cannot be TEXT there, so `resource_type` is capped at
// 255 characters on MySQL and MariaDB.
const MYSQL_SCHEMA: &[&str] = &["CREATE TABLE IF NOT EXISTS change_request (
        id VARCHAR(36) PRIMARY KEY,
        resource_type VARCHAR(255) NOT NULL,
        resource_id TEXT,
        action TEXT NOT NULL,
        payload_json LONGTEXT,
        diff_json LONGTEXT,
        status VARCHAR(32) NOT NULL,
        category VARCHAR(64) NOT NULL,
        requested_by TEXT NOT NULL,
        requested_at VARCHAR(40) NOT NULL,
        decided_by TEXT,
        decided_at VARCHAR(40),
        reason TEXT,
        last_error TEXT,
        dedup_key VARCHAR(64),
        UNIQUE KEY ux_change_request_dedup_key (dedup_key),
        KEY ix_change_request_type_status (resource_type, status)
    ) DEFAULT CHARSET = utf8mb4"];

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresDialect;

impl QueryDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${}", n)
    }

    fn schema_statements(&self) -> &'static [&'static str] {
        PORTABLE_SCHEMA
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MySQL / MariaDB
// ─────────────────────────────────────────────────────────────────────────────

pub struct MysqlDialect;

impl QueryDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn schema_statements(&self) -> &'static [&'static str] {
        MYSQL_SCHEMA
    }
}

// MariaDB shares MySQL's wire protocol and DDL.
pub struct MariadbDialect;

impl QueryDialect for MariadbDialect {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn placeholder(&self, n: usize) -> String {
        MysqlDialect.placeholder(n)
    }

    fn schema_statements(&self) -> &'static [&'static str] {
        MysqlDialect.schema_statements()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteDialect;

impl QueryDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn schema_statements(&self) -> &'static [&'static str] {
        PORTABLE_SCHEMA
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Pick the dialect for a configured driver name. Unknown names fall back
/// to PostgreSQL, matching [`crate::infrastructure::config::DbConfig::url`].
pub fn from_driver(driver: &str) -> Box<dyn QueryDialect> {
    match driver {
        "mysql" => Box::new(MysqlDialect),
        "mariadb" => Box::new(MariadbDialect),
        "sqlite" => Box::new(SqliteDialect),
        _ => Box::new(PostgresDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_per_driver() {
        assert_eq!(PostgresDialect.placeholders(3, 3), "$3, $4, $5");
        assert_eq!(SqliteDialect.placeholders(1, 2), "?, ?");
        assert_eq!(MariadbDialect.placeholder(9), "?");
    }

    #[test]
    fn factory_falls_back_to_postgres() {
        assert_eq!(from_driver("mariadb").name(), "mariadb");
        assert_eq!(from_driver("sqlite").name(), "sqlite");
        assert_eq!(from_driver("oracle").name(), "postgres");
    }

    #[test]
    fn mysql_declares_keys_inline() {
        assert_eq!(MysqlDialect.schema_statements().len(), 1);
        assert!(MysqlDialect.schema_statements()[0].contains("UNIQUE KEY"));
        assert_eq!(SqliteDialect.schema_statements().len(), 3);
    }

    #[test]
    fn free_text_headers_are_unbounded() {
        for ddl in [PORTABLE_SCHEMA[0], MYSQL_SCHEMA[0]] {
            for column in ["resource_id", "action", "requested_by", "decided_by"] {
                assert!(ddl.contains(&format!("{column} TEXT")), "{column}: {ddl}");
            }
        }
        assert!(PORTABLE_SCHEMA[0].contains("resource_type TEXT NOT NULL"));
        assert!(MYSQL_SCHEMA[0].contains("resource_type VARCHAR(255) NOT NULL"));
    }
}
