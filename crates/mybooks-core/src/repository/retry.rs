//! Bounded retry with exponential backoff for store calls

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::RepositoryError;
use crate::storage::StoreError;

/// How hard the repository tries before giving up on the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per store call, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    pub initial_backoff: Duration,
    /// Upper bound for the delay
    pub max_backoff: Duration,
    /// Re-read/re-apply rounds after a conditional write loses a race
    pub max_conflict_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            max_conflict_retries: 5,
        }
    }
}

/// A store call that failed for good
#[derive(Debug)]
pub(crate) struct StoreFailure {
    pub attempts: u32,
    pub error: StoreError,
}

impl From<StoreFailure> for RepositoryError {
    fn from(failure: StoreFailure) -> Self {
        RepositoryError::StoreUnavailable {
            attempts: failure.attempts,
            source: failure.error,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts
    pub(crate) async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, StoreFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %error,
                        "store call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(StoreFailure {
                        attempts: attempt,
                        error,
                    })
                }
            }
        }
    }
}
