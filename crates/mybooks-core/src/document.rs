//! Document serialization contract
//!
//! Bridges the typed entities (Author, Book, List) and the schemaless JSON
//! documents the store holds. Each entity kind declares its `type` tag; the
//! tag is stamped into the body on encode and checked on decode, and the
//! store's etag is carried on the decoded entity.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Author, Book, List};
use crate::storage::{ETag, Predicate, StoredDocument};

/// Field holding the entity kind in every stored document
pub const TYPE_FIELD: &str = "type";

/// Errors that can occur while encoding or decoding documents
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Expected a {expected} document, found type {found:?}")]
    KindMismatch {
        expected: EntityKind,
        found: Option<String>,
    },
}

/// The three kinds of catalog entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Author,
    Book,
    List,
}

impl EntityKind {
    /// The `type` tag stored with documents of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Author => "Author",
            EntityKind::Book => "Book",
            EntityKind::List => "List",
        }
    }

    /// Store predicate selecting every document of this kind
    pub fn predicate(&self) -> Predicate {
        Predicate::TypeIs(self.as_str().to_string())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entity that can be stored as a single document
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    fn etag(&self) -> Option<&ETag>;

    fn set_etag(&mut self, etag: Option<ETag>);

    /// Every entity lives alone in a partition named after its id
    fn partition_key(&self) -> String {
        self.id().to_string()
    }
}

macro_rules! impl_document {
    ($ty:ty, $kind:expr) => {
        impl Document for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn etag(&self) -> Option<&ETag> {
                self.etag.as_ref()
            }

            fn set_etag(&mut self, etag: Option<ETag>) {
                self.etag = etag;
            }
        }
    };
}

impl_document!(Author, EntityKind::Author);
impl_document!(Book, EntityKind::Book);
impl_document!(List, EntityKind::List);

/// Encode an entity as a store document with its `type` tag
pub fn encode<T: Document>(entity: &T) -> Result<Value, DocumentError> {
    let mut value = serde_json::to_value(entity)?;
    let object = value.as_object_mut().ok_or(DocumentError::NotAnObject)?;
    object.insert(
        TYPE_FIELD.to_string(),
        Value::String(T::KIND.as_str().to_string()),
    );
    Ok(value)
}

/// Decode a stored document, checking its `type` tag and keeping its etag
pub fn decode<T: Document>(stored: StoredDocument) -> Result<T, DocumentError> {
    let found = stored
        .body
        .get(TYPE_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string);
    if found.as_deref() != Some(T::KIND.as_str()) {
        return Err(DocumentError::KindMismatch {
            expected: T::KIND,
            found,
        });
    }

    let mut entity: T = serde_json::from_value(stored.body)?;
    entity.set_etag(Some(stored.etag));
    Ok(entity)
}
