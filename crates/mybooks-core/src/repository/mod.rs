//! Consistency repository
//!
//! The `Repository` is the only writer of catalog documents. Every entity
//! embeds shorthand copies of the entities it relates to, and the store
//! offers no multi-document transactions, so each logical operation is an
//! ordered sequence of single-document writes:
//!
//! - creations write the new (authoritative) document first, then mirrors
//! - deletions clean up mirrors first, then remove the owning document
//! - mirror updates are idempotent set operations, so re-running a failed
//!   operation converges on the same end state
//!
//! Nothing is cached between operations: each one re-reads what it touches.
//!
//! ## Usage
//!
//! ```ignore
//! let repo = Repository::new(SqliteDocumentStore::open(&config)?);
//!
//! let ada = repo.create_author(AuthorFields::new("Ada")).await?;
//! let logic = repo.create_book(BookForCreation::new("Logic", vec![ada])).await?;
//! repo.delete_author(ada).await?; // also deletes "Logic", its only author is gone
//! ```

mod authors;
mod books;
mod concurrency;
mod error;
mod lists;
mod retry;

use tracing::{debug, warn};
use uuid::Uuid;

pub use concurrency::{ConcurrencyMode, ParseConcurrencyModeError};
pub use error::{RepositoryError, RepositoryResult};
pub use retry::RetryPolicy;

use crate::config::Config;
use crate::document::{decode, encode, Document};
use crate::models::{Author, Book};
use crate::storage::{DocumentStore, StoreError, WriteCondition};
use concurrency::LockTable;

/// Keeps Author, Book and List documents and their mirrors consistent
pub struct Repository<S> {
    store: S,
    retry: RetryPolicy,
    mode: ConcurrencyMode,
    locks: LockTable,
}

impl<S: DocumentStore> Repository<S> {
    /// Create a repository with the default retry policy and concurrency mode
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            mode: ConcurrencyMode::default(),
            locks: LockTable::default(),
        }
    }

    /// Create a repository using the policies in `config`
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store)
            .with_retry_policy(config.retry_policy())
            .with_concurrency(config.concurrency)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Get the underlying document store
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn concurrency(&self) -> ConcurrencyMode {
        self.mode
    }

    // ==================== Accessors ====================

    /// Get an author by id
    pub async fn get_author(&self, id: Uuid) -> RepositoryResult<Author> {
        self.fetch(id).await
    }

    /// Get a book by id
    pub async fn get_book(&self, id: Uuid) -> RepositoryResult<Book> {
        self.fetch(id).await
    }

    /// Get a list by id
    pub async fn get_list(&self, id: Uuid) -> RepositoryResult<crate::models::List> {
        self.fetch(id).await
    }

    /// Get every author
    pub async fn list_authors(&self) -> RepositoryResult<Vec<Author>> {
        self.read_all().await
    }

    /// Get every book
    pub async fn list_books(&self) -> RepositoryResult<Vec<Book>> {
        self.read_all().await
    }

    /// Get every list
    pub async fn list_lists(&self) -> RepositoryResult<Vec<crate::models::List>> {
        self.read_all().await
    }

    /// Get the books an author's mirror points at
    ///
    /// Ids whose book has since disappeared are skipped; the mirror may lag
    /// behind a concurrent delete.
    pub async fn books_of_author(&self, author_id: Uuid) -> RepositoryResult<Vec<Book>> {
        let author: Author = self.fetch(author_id).await?;

        let mut books = Vec::with_capacity(author.books.len());
        for shorthand in &author.books {
            match self.read::<Book>(shorthand.id).await? {
                Some(book) => books.push(book),
                None => debug!(author = %author_id, book = %shorthand.id, "skipping vanished book"),
            }
        }
        Ok(books)
    }

    // ==================== Document access ====================

    /// Point read; `None` when the document does not exist
    async fn read<T: Document>(&self, id: Uuid) -> RepositoryResult<Option<T>> {
        let key = id.to_string();
        debug!(kind = %T::KIND, id = %key, "get");
        let stored = self
            .retry
            .run("get", || self.store.get(&key, &key))
            .await?;

        stored
            .map(|doc| {
                decode(doc).map_err(|source| RepositoryError::Malformed {
                    kind: T::KIND,
                    source,
                })
            })
            .transpose()
    }

    /// Point read that fails with `NotFound` when the document is absent
    async fn fetch<T: Document>(&self, id: Uuid) -> RepositoryResult<T> {
        self.read(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(T::KIND, id))
    }

    /// Every document of one kind, all pages drained
    async fn read_all<T: Document>(&self) -> RepositoryResult<Vec<T>> {
        let predicate = T::KIND.predicate();
        debug!(kind = %T::KIND, "query");
        let documents = self
            .retry
            .run("query", || self.store.query(&predicate))
            .await?;

        documents
            .into_iter()
            .map(|doc| {
                decode(doc).map_err(|source| RepositoryError::Malformed {
                    kind: T::KIND,
                    source,
                })
            })
            .collect()
    }

    /// Upsert `entity` and record its new etag
    ///
    /// A failed precondition surfaces as `Conflict`.
    async fn upsert<T: Document>(
        &self,
        entity: &mut T,
        condition: WriteCondition,
    ) -> RepositoryResult<()> {
        let body = encode(entity).map_err(|source| RepositoryError::Malformed {
            kind: T::KIND,
            source,
        })?;
        let key = entity.partition_key();
        debug!(kind = %T::KIND, id = %key, ?condition, "upsert");

        let result = self
            .retry
            .run("upsert", || {
                self.store.upsert(body.clone(), &key, condition.clone())
            })
            .await;

        match result {
            Ok(etag) => {
                entity.set_etag(Some(etag));
                Ok(())
            }
            Err(failure) if matches!(failure.error, StoreError::PreconditionFailed { .. }) => {
                Err(RepositoryError::Conflict {
                    kind: T::KIND,
                    id: entity.id(),
                })
            }
            Err(failure) => Err(failure.into()),
        }
    }

    /// Write a brand-new document
    async fn insert<T: Document>(&self, entity: &mut T) -> RepositoryResult<()> {
        self.upsert(entity, WriteCondition::Unconditional).await
    }

    /// Write an instance the caller read earlier
    ///
    /// In optimistic mode the write only lands if the document has not
    /// changed since that read; otherwise `Conflict` is returned and the
    /// caller decides whether to re-read.
    async fn save_instance<T: Document>(&self, entity: &mut T) -> RepositoryResult<()> {
        let _guard = match self.mode {
            ConcurrencyMode::Locked => Some(self.locks.acquire(entity.id()).await),
            _ => None,
        };
        let condition = self.condition_for(&*entity);
        self.upsert(entity, condition).await
    }

    fn condition_for<T: Document>(&self, entity: &T) -> WriteCondition {
        match (self.mode, entity.etag()) {
            (ConcurrencyMode::Optimistic, Some(etag)) => WriteCondition::IfMatch(etag.clone()),
            _ => WriteCondition::Unconditional,
        }
    }

    /// Read-modify-write a single document
    ///
    /// `apply` returns whether it changed anything; unchanged documents are
    /// not written. Returns `None` if the document does not exist. In
    /// optimistic mode a lost race re-reads and re-applies, up to the
    /// policy's conflict budget.
    async fn mutate<T, F>(&self, id: Uuid, mut apply: F) -> RepositoryResult<Option<T>>
    where
        T: Document,
        F: FnMut(&mut T) -> bool + Send,
    {
        let _guard = match self.mode {
            ConcurrencyMode::Locked => Some(self.locks.acquire(id).await),
            _ => None,
        };

        let mut conflicts = 0;
        loop {
            let mut entity = match self.read::<T>(id).await? {
                Some(entity) => entity,
                None => return Ok(None),
            };
            if !apply(&mut entity) {
                return Ok(Some(entity));
            }

            let condition = self.condition_for(&entity);
            match self.upsert(&mut entity, condition).await {
                Ok(()) => return Ok(Some(entity)),
                Err(RepositoryError::Conflict { .. })
                    if conflicts < self.retry.max_conflict_retries =>
                {
                    conflicts += 1;
                    warn!(kind = %T::KIND, id = %id, conflicts, "write conflict, re-reading");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Like [`mutate`](Self::mutate), but a missing document is `NotFound`
    async fn mutate_existing<T, F>(&self, id: Uuid, apply: F) -> RepositoryResult<T>
    where
        T: Document,
        F: FnMut(&mut T) -> bool + Send,
    {
        self.mutate(id, apply)
            .await?
            .ok_or_else(|| RepositoryError::not_found(T::KIND, id))
    }

    /// Delete a document. Returns false if it was already gone.
    async fn remove<T: Document>(&self, id: Uuid) -> RepositoryResult<bool> {
        let key = id.to_string();
        debug!(kind = %T::KIND, id = %key, "delete");
        match self
            .retry
            .run("delete", || self.store.delete(&key, &key))
            .await
        {
            Ok(()) => Ok(true),
            Err(failure) if matches!(failure.error, StoreError::NotFound { .. }) => Ok(false),
            Err(failure) => Err(failure.into()),
        }
    }
}
