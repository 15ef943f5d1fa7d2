//! SQL migration definitions for the postfeed database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its own version in `schema_migrations` as its last statement.

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
        description: "Initial schema: summaries, texts, documents",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per processed post; presence marks the post as known
CREATE TABLE IF NOT EXISTS summaries (
    id         TEXT PRIMARY KEY,
    url        TEXT NOT NULL,
    title      TEXT NOT NULL,
    summary    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Extracted full text, keyed like summaries
CREATE TABLE IF NOT EXISTS texts (
    id         TEXT PRIMARY KEY,
    text       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- The retrieval corpus; position preserves insertion order
CREATE TABLE IF NOT EXISTS documents (
    position INTEGER PRIMARY KEY,
    metadata TEXT NOT NULL UNIQUE,
    text     TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
