//! Node and root tables

use crate::error::{SqliteError, SqliteResult};
use rusqlite::Connection;
use tracing::debug;

/// Table definitions, safe to apply repeatedly
///
/// `created_at` and `deleted_at` are unix seconds. `created_at` records the
/// first insert; `deleted_at` is reserved and never written.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS mt_nodes (
    mt_id INTEGER,
    key BLOB,
    type INTEGER NOT NULL,
    child_l BLOB,
    child_r BLOB,
    entry BLOB,
    created_at INTEGER,
    deleted_at INTEGER,
    PRIMARY KEY(mt_id, key)
);

CREATE TABLE IF NOT EXISTS mt_roots (
    mt_id INTEGER PRIMARY KEY,
    key BLOB,
    created_at INTEGER,
    deleted_at INTEGER
);
"#;

/// Create the node and root tables if they do not exist
pub fn ensure_schema(conn: &Connection) -> SqliteResult<()> {
    debug!("Ensuring mt_nodes and mt_roots tables");

    conn.execute_batch(SCHEMA)
        .map_err(|e| SqliteError::Schema(format!("Failed to create tables: {}", e)))
}
