//! MyBooks Core Library
//!
//! This crate keeps a catalog of authors, books and reading lists
//! consistent on top of a document store that only offers single-document
//! atomic writes.
//!
//! # Architecture
//!
//! - **Documents**: every entity is one JSON document, tagged with its kind
//! - **Mirrors**: entities embed shorthand copies of the entities they relate
//!   to, so a single read renders a full view
//! - **Repository**: the one writer, which orders single-document writes so
//!   any interruption leaves a state that a re-run repairs
//!
//! # Quick Start
//!
//! ```text
//! let repo = Repository::new(SqliteDocumentStore::open(&config)?);
//!
//! let ada = repo.create_author(AuthorFields::new("Ada")).await?;
//! let logic = repo.create_book(BookForCreation::new("Logic", vec![ada])).await?;
//! let favorites = repo.create_list(ListForCreation::new("Favorites", vec![])).await?;
//! repo.add_book(favorites, logic).await?;
//! ```
//!
//! # Modules
//!
//! - `repository`: consistency repository (main entry point)
//! - `models`: entities and their shorthand projections
//! - `fields`: caller-supplied field sets and patches
//! - `document`: entity <-> stored document contract
//! - `storage`: document store trait, SQLite and in-memory adapters
//! - `config`: application configuration

pub mod config;
pub mod document;
pub mod fields;
pub mod models;
pub mod repository;
pub mod storage;

pub use config::{Config, RetryConfig};
pub use document::{DocumentError, EntityKind};
pub use fields::{
    AuthorFields, AuthorPatch, BookFields, BookForCreation, BookPatch, ListFields,
    ListForCreation, ListPatch,
};
pub use models::{Author, AuthorShorthand, Book, BookListItem, BookShorthand, List, ListShorthand};
pub use repository::{ConcurrencyMode, Repository, RepositoryError, RepositoryResult, RetryPolicy};
pub use storage::{
    DocumentStore, InMemoryDocumentStore, SqliteDocumentStore, StoreError, StoreResult,
};
