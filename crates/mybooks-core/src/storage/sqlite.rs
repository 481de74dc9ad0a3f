//! SQLite document store
//!
//! Durable [`DocumentStore`] backed by a single SQLite file. Each document is
//! one row; conditional writes run inside a transaction so the etag check
//! and the write are atomic. Pages are read in `(partition_key, id)` order
//! and the continuation token is the last key returned.
//!
//! rusqlite is synchronous, so every store call runs on tokio's blocking
//! pool and the async caller only awaits its result.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use super::schema::{init_schema, needs_init};
use super::{
    document_id, DocumentStore, ETag, Page, Predicate, StoreError, StoreResult, StoredDocument,
    WriteCondition, DEFAULT_PAGE_SIZE,
};
use crate::config::Config;

/// SQLite-backed document store
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
    page_size: usize,
}

impl SqliteDocumentStore {
    /// Open or create the database described by `config`
    pub fn open(config: &Config) -> StoreResult<Self> {
        let path = config.sqlite_path();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::from_connection(conn, config.page_size)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, DEFAULT_PAGE_SIZE)
    }

    fn from_connection(conn: Connection, page_size: usize) -> StoreResult<Self> {
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            page_size: page_size.max(1),
        })
    }

    /// Use a different page size for queries
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Count stored documents, optionally of a single type
    ///
    /// Runs on the calling thread; meant for one-off status reporting.
    pub fn count(&self, kind: Option<&str>) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count = match kind {
            Some(kind) => conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE type = ?1",
                params![kind],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            op(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
}

fn row_to_document(etag: String, body: String) -> StoreResult<StoredDocument> {
    Ok(StoredDocument {
        body: serde_json::from_str(&body)?,
        etag: ETag::from(etag),
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, id: &str, partition_key: &str) -> StoreResult<Option<StoredDocument>> {
        let id = id.to_string();
        let partition_key = partition_key.to_string();

        self.with_conn(move |conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT etag, body FROM documents WHERE partition_key = ?1 AND id = ?2",
                    params![partition_key, id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(etag, body)| row_to_document(etag, body))
                .transpose()
        })
        .await
    }

    async fn query_page(
        &self,
        predicate: &Predicate,
        continuation: Option<&str>,
    ) -> StoreResult<Page> {
        let after: Option<(String, String)> = continuation
            .map(|token| {
                serde_json::from_str(token)
                    .map_err(|_| StoreError::InvalidContinuation(token.to_string()))
            })
            .transpose()?;

        let kind = match predicate {
            Predicate::TypeIs(kind) => Some(kind.clone()),
            Predicate::All => None,
        };
        let page_size = self.page_size;

        self.with_conn(move |conn| {
            let (after_pk, after_id) = match after {
                Some((pk, id)) => (Some(pk), Some(id)),
                None => (None, None),
            };

            let mut stmt = conn.prepare(
                r#"
                SELECT partition_key, id, etag, body FROM documents
                WHERE (?1 IS NULL OR type = ?1)
                  AND (?2 IS NULL OR partition_key > ?2 OR (partition_key = ?2 AND id > ?3))
                ORDER BY partition_key, id
                LIMIT ?4
                "#,
            )?;

            // One extra row tells us whether another page exists
            let limit = (page_size + 1) as i64;
            let rows = stmt.query_map(params![kind, after_pk, after_id, limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;

            let mut documents = Vec::new();
            let mut last_key = None;
            let mut more = false;
            for row in rows {
                let (pk, id, etag, body) = row?;
                if documents.len() == page_size {
                    more = true;
                    break;
                }
                documents.push(row_to_document(etag, body)?);
                last_key = Some((pk, id));
            }

            let continuation = match (more, last_key) {
                (true, Some(key)) => Some(serde_json::to_string(&key)?),
                _ => None,
            };
            Ok(Page {
                documents,
                continuation,
            })
        })
        .await
    }

    async fn upsert(
        &self,
        document: Value,
        partition_key: &str,
        condition: WriteCondition,
    ) -> StoreResult<ETag> {
        let id = document_id(&document)?;
        let kind = document.get("type").and_then(Value::as_str).map(str::to_string);
        let body = serde_json::to_string(&document)?;
        let partition_key = partition_key.to_string();
        let etag = ETag::generate();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            if let WriteCondition::IfMatch(expected) = &condition {
                let current: Option<String> = tx
                    .query_row(
                        "SELECT etag FROM documents WHERE partition_key = ?1 AND id = ?2",
                        params![partition_key, id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if current.as_deref() != Some(expected.as_str()) {
                    debug!(id = %id, "conditional upsert rejected");
                    return Err(StoreError::PreconditionFailed { id });
                }
            }

            tx.execute(
                r#"
                INSERT INTO documents (partition_key, id, type, etag, body, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (partition_key, id) DO UPDATE SET
                    type = excluded.type,
                    etag = excluded.etag,
                    body = excluded.body,
                    updated_at = excluded.updated_at
                "#,
                params![
                    partition_key,
                    id,
                    kind,
                    etag.as_str(),
                    body,
                    Utc::now().timestamp_millis()
                ],
            )?;
            tx.commit()?;

            Ok(etag)
        })
        .await
    }

    async fn delete(&self, id: &str, partition_key: &str) -> StoreResult<()> {
        let id = id.to_string();
        let partition_key = partition_key.to_string();

        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM documents WHERE partition_key = ?1 AND id = ?2",
                params![partition_key, id],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound { id });
            }
            Ok(())
        })
        .await
    }
}
