//! SQL migration definitions for the page cache database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: partitions, pages, update_log",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Root container: one row per partition (platforms + common)
CREATE TABLE IF NOT EXISTS partitions (
    name TEXT PRIMARY KEY
);

-- Compressed page text keyed by partition and command name
CREATE TABLE IF NOT EXISTS pages (
    partition TEXT NOT NULL REFERENCES partitions(name) ON DELETE CASCADE,
    command   TEXT NOT NULL,
    content   BLOB NOT NULL,
    PRIMARY KEY (partition, command)
);

-- Update history
CREATE TABLE IF NOT EXISTS update_log (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    stats_json  TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
