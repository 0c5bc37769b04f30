//! Bounded exponential backoff with jitter for transient forge failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::errors::{ForgeError, ForgeResult};

/// Retry policy: attempt count and backoff shape.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Maximum random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay * 2u32.saturating_pow(attempt);
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..=self.max_jitter);
        backoff + jitter
    }
}

/// Runs `op`, retrying on [`ForgeError::is_retryable`] failures.
///
/// A `Retry-After` hint from rate limiting overrides the computed backoff.
/// Terminal errors (401/403/404 and schema problems) are returned on first
/// occurrence.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> ForgeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ForgeResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = match &e {
                    ForgeError::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Duration::from_secs(*secs),
                    _ => policy.delay_for(attempt),
                };
                warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient forge failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::from_millis(1),
        };
        let out = retry(policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ForgeError::Server(503))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let out: ForgeResult<()> = retry(RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ForgeError::Unauthorized) }
        })
        .await;
        assert!(matches!(out, Err(ForgeError::Unauthorized)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_on_persistent_failure() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::from_millis(1),
        };
        let out: ForgeResult<()> = retry(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ForgeError::Timeout) }
        })
        .await;
        assert!(matches!(out, Err(ForgeError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
