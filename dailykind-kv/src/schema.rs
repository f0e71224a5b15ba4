//! SQLite DDL for the durable store.

use rusqlite::Connection;

/// Complete DDL. Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

-- Scalar keys. expires_at is epoch milliseconds; NULL means no expiry.
CREATE TABLE IF NOT EXISTS kv_entries (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,       -- JSON document
    expires_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_entries_expires_at ON kv_entries(expires_at);

-- Set members. Sets never expire.
CREATE TABLE IF NOT EXISTS kv_set_members (
    set_key TEXT NOT NULL,
    member  TEXT NOT NULL,
    PRIMARY KEY (set_key, member)
);
"#;

/// Apply the full schema to an open connection.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
