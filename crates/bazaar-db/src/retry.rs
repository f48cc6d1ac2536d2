//! # Transaction Retry
//!
//! Re-runs a whole unit of work when it lost a race with another writer.
//!
//! ```text
//! attempt 1 ──► Busy / Conflict ──► backoff ──► attempt 2 ──► ... ──► give up
//!     │
//!     └──► Ok / permanent error ──► returned as-is
//! ```
//!
//! The closure must open and commit its own transaction. A failed attempt's
//! transaction is dropped (rolled back) before the next attempt starts, so
//! every attempt re-reads current state.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::error::DbError;

/// Errors that may clear up when the transaction is retried.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for DbError {
    fn is_transient(&self) -> bool {
        DbError::is_transient(self)
    }
}

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// First wait; later waits grow exponentially with jitter.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.base_delay,
            max_interval: self.base_delay * 16,
            multiplier: 2.0,
            max_elapsed_time: None, // bounded by max_attempts instead
            ..Default::default()
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or attempts run out.
///
/// ## Example
/// ```rust,ignore
/// let order = with_retry("cancel_order", RetryPolicy::default(), || {
///     self.cancel_once(user_id, order_id, reason)
/// })
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = policy.create_backoff();
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = backoff.next_backoff().unwrap_or(policy.base_delay);
                warn!(
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying transaction"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<u32, DbError> = with_retry("test", fast(), || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(DbError::conflict("Order", "o1"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), DbError> = with_retry("test", fast(), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::not_found("Order", "o1"))
        })
        .await;

        assert!(matches!(result, Err(DbError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), DbError> = with_retry("test", fast(), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Busy("locked".into()))
        })
        .await;

        assert!(matches!(result, Err(DbError::Busy(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
