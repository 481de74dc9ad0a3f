//! Storage layer
//!
//! The repository talks to its backing store only through [`DocumentStore`]:
//! point reads, paged type-scoped queries, upserts and deletes of
//! schemaless JSON documents addressed by `(id, partition_key)`. Writes are
//! atomic per document and nothing more.
//!
//! ## Adapters
//!
//! - [`SqliteDocumentStore`]: durable, single-file store used by the CLI
//! - [`InMemoryDocumentStore`]: ordered map with fault injection, for tests
//!
//! Every write assigns a fresh [`ETag`]; passing `WriteCondition::IfMatch`
//! turns an upsert into a compare-and-swap against that tag.

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDocumentStore;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteDocumentStore;

/// Default number of documents returned per query page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Opaque version tag assigned by the store on every write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag(String);

impl ETag {
    /// Generate a fresh, unique tag
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ETag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A document as held by the store, with its current tag
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub body: Value,
    pub etag: ETag,
}

/// Precondition attached to an upsert
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WriteCondition {
    /// Overwrite whatever is there
    #[default]
    Unconditional,
    /// Only write if the stored document still carries this tag
    IfMatch(ETag),
}

/// Store-side filter for queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Documents whose `type` tag equals the given value
    TypeIs(String),
    /// Every document in the container
    All,
}

impl Predicate {
    /// Check a document body against this predicate
    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Predicate::TypeIs(kind) => body.get("type").and_then(Value::as_str) == Some(kind),
            Predicate::All => true,
        }
    }
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub documents: Vec<StoredDocument>,
    /// Token for the next page; `None` once the result set is exhausted
    pub continuation: Option<String>,
}

/// Narrow CRUD/query contract the repository depends on
///
/// Implementations must be safe to call concurrently. The partition key for
/// this service is always the document's own id, but adapters must not
/// assume so.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, id: &str, partition_key: &str) -> StoreResult<Option<StoredDocument>>;

    /// Read one page of documents matching `predicate`, unordered from the
    /// caller's point of view
    async fn query_page(
        &self,
        predicate: &Predicate,
        continuation: Option<&str>,
    ) -> StoreResult<Page>;

    /// Insert or replace a document. The body must carry a string `id`.
    async fn upsert(
        &self,
        document: Value,
        partition_key: &str,
        condition: WriteCondition,
    ) -> StoreResult<ETag>;

    /// Delete a document; fails with `StoreError::NotFound` if it is absent
    async fn delete(&self, id: &str, partition_key: &str) -> StoreResult<()>;

    /// Run a query to completion, following continuation tokens until the
    /// store reports no more pages
    async fn query(&self, predicate: &Predicate) -> StoreResult<Vec<StoredDocument>> {
        let mut documents = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self.query_page(predicate, continuation.as_deref()).await?;
            documents.extend(page.documents);
            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        Ok(documents)
    }
}

/// Extract the string `id` every stored document must carry
pub(crate) fn document_id(document: &Value) -> StoreResult<String> {
    document
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidDocument("missing string field 'id'".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_predicate_type_is() {
        let predicate = Predicate::TypeIs("Book".to_string());
        assert!(predicate.matches(&json!({"id": "1", "type": "Book"})));
        assert!(!predicate.matches(&json!({"id": "1", "type": "Author"})));
        assert!(!predicate.matches(&json!({"id": "1"})));
        assert!(Predicate::All.matches(&json!({"id": "1"})));
    }

    #[test]
    fn test_etags_are_unique() {
        assert_ne!(ETag::generate(), ETag::generate());
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id(&json!({"id": "abc"})).unwrap(), "abc");
        assert!(matches!(
            document_id(&json!({"id": 7})),
            Err(StoreError::InvalidDocument(_))
        ));
    }
}
