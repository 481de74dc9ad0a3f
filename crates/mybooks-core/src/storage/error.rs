//! Storage error handling
//!
//! Provides typed errors for document store operations and classifies which
//! of them are worth retrying.

use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during document store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or refused the request for now
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within its deadline
    #[error("Document store timed out after {0:?}")]
    Timeout(Duration),

    /// A conditional write found a different version (or no document)
    #[error("Precondition failed for document '{id}': it was modified or removed concurrently")]
    PreconditionFailed { id: String },

    /// Delete of a document that does not exist
    #[error("Document not found: '{id}'")]
    NotFound { id: String },

    /// The document cannot be stored as given
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A continuation token this store did not issue
    #[error("Invalid continuation token: {0}")]
    InvalidContinuation(String),

    /// Stored JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(rusqlite::Error),
}

impl StoreError {
    /// Check if repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => {
                Some("The store is busy or unreachable. Try again in a moment.")
            }
            StoreError::PreconditionFailed { .. } => {
                Some("Another operation changed the document. Re-read it and try again.")
            }
            StoreError::Database(_) => {
                Some("Check that the data directory is writable and the database file is not corrupted.")
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    /// Busy and locked databases are transient; everything else is not
    fn from(error: rusqlite::Error) -> Self {
        match error.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Unavailable(error.to_string())
            }
            _ => StoreError::Database(error),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Unavailable("down".to_string()).is_retryable());
        assert!(StoreError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!StoreError::PreconditionFailed { id: "x".to_string() }.is_retryable());
        assert!(!StoreError::NotFound { id: "x".to_string() }.is_retryable());
        assert!(!StoreError::InvalidDocument("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_busy_database_is_unavailable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err = StoreError::from(busy);
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_database_errors_are_fatal() {
        let err = StoreError::from(rusqlite::Error::InvalidQuery);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_retryable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::PreconditionFailed {
            id: "abc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Precondition failed"));
        assert!(msg.contains("abc"));
    }
}
