//! Repository error handling

use thiserror::Error;
use uuid::Uuid;

use crate::document::{DocumentError, EntityKind};
use crate::storage::StoreError;

/// Errors surfaced by repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The requested entity, or one the caller referenced, does not exist
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: Uuid },

    /// The mutation would break a catalog invariant; nothing was written
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A concurrent writer kept winning the race for this document
    #[error("{kind} '{id}' was modified concurrently; re-read and try again")]
    Conflict { kind: EntityKind, id: Uuid },

    /// The document store failed, after retries where retrying made sense
    #[error("Document store unavailable after {attempts} attempt(s): {source}")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A stored document could not be decoded as the expected entity
    #[error("Malformed {kind} document: {source}")]
    Malformed {
        kind: EntityKind,
        #[source]
        source: DocumentError,
    },
}

impl RepositoryError {
    pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> Self {
        RepositoryError::NotFound { kind, id }
    }

    /// Check if the caller may simply run the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepositoryError::Conflict { .. } | RepositoryError::StoreUnavailable { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            RepositoryError::Conflict { .. } => {
                Some("Another operation changed the same entity. Run the command again.")
            }
            RepositoryError::StoreUnavailable { source, .. } => source.recovery_suggestion(),
            RepositoryError::InvalidOperation(_) => {
                Some("A book must keep at least one author. Add another author first, or delete the book.")
            }
            _ => None,
        }
    }
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let id = Uuid::new_v4();
        let err = RepositoryError::not_found(EntityKind::Book, id);
        let msg = err.to_string();
        assert!(msg.contains("Book"));
        assert!(msg.contains(&id.to_string()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_kinds() {
        let conflict = RepositoryError::Conflict {
            kind: EntityKind::Author,
            id: Uuid::new_v4(),
        };
        assert!(conflict.is_retryable());
        assert!(conflict.recovery_suggestion().is_some());

        let unavailable = RepositoryError::StoreUnavailable {
            attempts: 3,
            source: StoreError::Unavailable("down".to_string()),
        };
        assert!(unavailable.is_retryable());
        assert!(unavailable.to_string().contains("3 attempt"));

        assert!(!RepositoryError::InvalidOperation("no".to_string()).is_retryable());
    }
}
