//! Guards for concurrent writes to the same document
//!
//! The store has no multi-document transactions, so each mirror update is a
//! single-document read-modify-write. [`ConcurrencyMode`] decides how those
//! are protected against lost updates.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// How read-modify-write cycles on one document are protected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrencyMode {
    /// Unconditional upserts; concurrent mirror updates may be lost
    LastWriterWins,
    /// One in-process async mutex per document id
    Locked,
    /// Conditional upserts on the etag, re-applied on conflict
    #[default]
    Optimistic,
}

impl ConcurrencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyMode::LastWriterWins => "last-writer-wins",
            ConcurrencyMode::Locked => "locked",
            ConcurrencyMode::Optimistic => "optimistic",
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("Unknown concurrency mode '{0}'. Use last-writer-wins, locked or optimistic.")]
pub struct ParseConcurrencyModeError(String);

impl FromStr for ConcurrencyMode {
    type Err = ParseConcurrencyModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last-writer-wins" | "lww" => Ok(ConcurrencyMode::LastWriterWins),
            "locked" => Ok(ConcurrencyMode::Locked),
            "optimistic" => Ok(ConcurrencyMode::Optimistic),
            _ => Err(ParseConcurrencyModeError(s.to_string())),
        }
    }
}

/// Per-id async mutexes, created on demand
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody is holding or waiting on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}
