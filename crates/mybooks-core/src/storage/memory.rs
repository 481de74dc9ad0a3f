//! In-memory document store
//!
//! A `BTreeMap` keyed by `(partition_key, id)` behind a mutex. Paging and
//! conditional writes behave like the SQLite adapter. Tests can inject
//! transient failures and block writes to specific documents to simulate a
//! crash part-way through a multi-document operation, and make every call
//! yield to the scheduler first so concurrent operations interleave even on
//! a single-threaded runtime.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    document_id, DocumentStore, ETag, Page, Predicate, StoreError, StoreResult, StoredDocument,
    WriteCondition, DEFAULT_PAGE_SIZE,
};

type Key = (String, String);

#[derive(Debug, Default)]
struct Faults {
    /// Number of upcoming calls that fail with `Unavailable`
    transient: u32,
    /// Document ids whose upserts and deletes always fail
    blocked: HashSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<Key, StoredDocument>,
    faults: Faults,
    writes: u64,
}

/// Thread-safe in-memory [`DocumentStore`]
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    inner: Mutex<Inner>,
    page_size: usize,
    yielding: bool,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Create an empty store with the default page size
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store returning at most `page_size` documents per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_size: page_size.max(1),
            yielding: false,
        }
    }

    /// Yield to the scheduler at the start of every call
    pub fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    async fn pause(&self) {
        if self.yielding {
            tokio::task::yield_now().await;
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Make the next `count` calls fail with a retryable error
    pub fn inject_transient_failures(&self, count: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.transient = count;
        }
    }

    /// Make every upsert or delete of `id` fail until unblocked
    pub fn block_writes_to(&self, id: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.blocked.insert(id.into());
        }
    }

    /// Clear all injected faults
    pub fn clear_faults(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults = Faults::default();
        }
    }

    /// Number of successful upserts and deletes so far
    pub fn write_count(&self) -> u64 {
        self.inner.lock().map(|inner| inner.writes).unwrap_or(0)
    }

    /// Number of documents currently stored
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.documents.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every document body, keyed by id
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .documents
                    .iter()
                    .map(|((_, id), doc)| (id.clone(), doc.body.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Inner {
    fn take_transient_fault(&mut self) -> StoreResult<()> {
        if self.faults.transient > 0 {
            self.faults.transient -= 1;
            return Err(StoreError::Unavailable("injected transient failure".to_string()));
        }
        Ok(())
    }

    fn check_blocked(&self, id: &str) -> StoreResult<()> {
        if self.faults.blocked.contains(id) {
            return Err(StoreError::Unavailable(format!(
                "writes to '{}' are blocked",
                id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: &str, partition_key: &str) -> StoreResult<Option<StoredDocument>> {
        self.pause().await;
        let mut inner = self.lock()?;
        inner.take_transient_fault()?;
        Ok(inner
            .documents
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned())
    }

    async fn query_page(
        &self,
        predicate: &Predicate,
        continuation: Option<&str>,
    ) -> StoreResult<Page> {
        self.pause().await;
        let mut inner = self.lock()?;
        inner.take_transient_fault()?;

        let lower = match continuation {
            Some(token) => {
                let key: Key = serde_json::from_str(token)
                    .map_err(|_| StoreError::InvalidContinuation(token.to_string()))?;
                Bound::Excluded(key)
            }
            None => Bound::Unbounded,
        };

        let mut documents = Vec::new();
        let mut last_key = None;
        let mut more = false;
        for (key, doc) in inner.documents.range((lower, Bound::Unbounded)) {
            if !predicate.matches(&doc.body) {
                continue;
            }
            if documents.len() == self.page_size {
                more = true;
                break;
            }
            documents.push(doc.clone());
            last_key = Some(key.clone());
        }

        let continuation = match (more, last_key) {
            (true, Some(key)) => Some(serde_json::to_string(&key)?),
            _ => None,
        };
        Ok(Page {
            documents,
            continuation,
        })
    }

    async fn upsert(
        &self,
        document: Value,
        partition_key: &str,
        condition: WriteCondition,
    ) -> StoreResult<ETag> {
        self.pause().await;
        let id = document_id(&document)?;
        let mut inner = self.lock()?;
        inner.take_transient_fault()?;
        inner.check_blocked(&id)?;

        let key = (partition_key.to_string(), id.clone());
        if let WriteCondition::IfMatch(expected) = &condition {
            match inner.documents.get(&key) {
                Some(current) if &current.etag == expected => {}
                _ => return Err(StoreError::PreconditionFailed { id }),
            }
        }

        let etag = ETag::generate();
        inner.documents.insert(
            key,
            StoredDocument {
                body: document,
                etag: etag.clone(),
            },
        );
        inner.writes += 1;
        Ok(etag)
    }

    async fn delete(&self, id: &str, partition_key: &str) -> StoreResult<()> {
        self.pause().await;
        let mut inner = self.lock()?;
        inner.take_transient_fault()?;
        inner.check_blocked(id)?;

        match inner
            .documents
            .remove(&(partition_key.to_string(), id.to_string()))
        {
            Some(_) => {
                inner.writes += 1;
                Ok(())
            }
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, kind: &str) -> Value {
        json!({"id": id, "type": kind})
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = InMemoryDocumentStore::new();
        let etag = store
            .upsert(doc("a", "Author"), "a", WriteCondition::Unconditional)
            .await
            .unwrap();

        let stored = store.get("a", "a").await.unwrap().unwrap();
        assert_eq!(stored.etag, etag);
        assert_eq!(stored.body["type"], "Author");

        // Wrong partition key does not find it
        assert!(store.get("a", "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_upsert() {
        let store = InMemoryDocumentStore::new();
        let first = store
            .upsert(doc("a", "Author"), "a", WriteCondition::Unconditional)
            .await
            .unwrap();
        let second = store
            .upsert(doc("a", "Author"), "a", WriteCondition::IfMatch(first.clone()))
            .await
            .unwrap();
        assert_ne!(first, second);

        let stale = store
            .upsert(doc("a", "Author"), "a", WriteCondition::IfMatch(first))
            .await;
        assert!(matches!(stale, Err(StoreError::PreconditionFailed { .. })));

        let missing = store
            .upsert(doc("b", "Author"), "b", WriteCondition::IfMatch(second))
            .await;
        assert!(matches!(missing, Err(StoreError::PreconditionFailed { .. })));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let result = store.delete("nope", "nope").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_query_drains_all_pages() {
        let store = InMemoryDocumentStore::with_page_size(2);
        for i in 0..5 {
            let id = format!("book-{}", i);
            store
                .upsert(doc(&id, "Book"), &id, WriteCondition::Unconditional)
                .await
                .unwrap();
        }
        store
            .upsert(doc("author", "Author"), "author", WriteCondition::Unconditional)
            .await
            .unwrap();

        let predicate = Predicate::TypeIs("Book".to_string());
        let first = store.query_page(&predicate, None).await.unwrap();
        assert_eq!(first.documents.len(), 2);
        assert!(first.continuation.is_some());

        let books = store.query(&predicate).await.unwrap();
        assert_eq!(books.len(), 5);
        assert_eq!(store.query(&Predicate::All).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_bad_continuation() {
        let store = InMemoryDocumentStore::new();
        let result = store.query_page(&Predicate::All, Some("garbage")).await;
        assert!(matches!(result, Err(StoreError::InvalidContinuation(_))));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = InMemoryDocumentStore::new();
        store.inject_transient_failures(1);
        let err = store.get("a", "a").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.get("a", "a").await.unwrap().is_none());

        store.block_writes_to("a");
        assert!(store
            .upsert(doc("a", "Author"), "a", WriteCondition::Unconditional)
            .await
            .is_err());
        assert_eq!(store.write_count(), 0);

        store.clear_faults();
        store
            .upsert(doc("a", "Author"), "a", WriteCondition::Unconditional)
            .await
            .unwrap();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_yielding_store_interleaves_callers() {
        let store = InMemoryDocumentStore::new().yielding();
        store
            .upsert(doc("a", "Author"), "a", WriteCondition::Unconditional)
            .await
            .unwrap();

        let read_then_write = |v: i64| {
            let store = &store;
            async move {
                let current = store.get("a", "a").await?.map(|d| d.etag);
                let condition =
                    current.map_or(WriteCondition::Unconditional, WriteCondition::IfMatch);
                store.upsert(json!({"id": "a", "v": v}), "a", condition).await
            }
        };
        let (left, right) = tokio::join!(read_then_write(1), read_then_write(2));

        // Both reads happen before either write, so one write is stale
        let stale = [&left, &right]
            .iter()
            .filter(|r| matches!(r, Err(StoreError::PreconditionFailed { .. })))
            .count();
        assert_eq!(stale, 1);
        assert!(left.is_ok() || right.is_ok());
        assert_eq!(store.write_count(), 2);
    }
}
