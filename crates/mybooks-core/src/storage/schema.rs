//! SQLite schema for the document store
//!
//! One table holds every document as JSON text. The `type` column is copied
//! out of the body at write time so type-scoped queries stay on an index.

use rusqlite::{params, Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Documents, one row per (partition, id)
        CREATE TABLE IF NOT EXISTS documents (
            partition_key TEXT NOT NULL,
            id TEXT NOT NULL,
            type TEXT,
            etag TEXT NOT NULL,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (partition_key, id)
        );

        -- Type-scoped queries page in key order
        CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(type, partition_key, id);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let result: Result<String> = conn.query_row(
        "SELECT value FROM schema_info WHERE key = 'version'",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(version) => Ok(version.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("no such table") => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Check if the schema needs to be initialized or migrated
pub fn needs_init(conn: &Connection) -> bool {
    !matches!(get_schema_version(conn), Ok(Some(v)) if v == SCHEMA_VERSION)
}
