//! Bounded retry for idempotent session calls.
//!
//! Only [`AuthErrorKind::RateLimited`](crate::AuthErrorKind::RateLimited) and
//! [`AuthErrorKind::TransportFailure`](crate::AuthErrorKind::TransportFailure)
//! are retried; everything else returns on the first failure.

mod backoff;

pub use backoff::ExponentialBackoff;

use std::future::Future;

use crate::auth::AuthFailure;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: ExponentialBackoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: ExponentialBackoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs `attempt` until it succeeds, fails terminally, or attempts run out.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, AuthFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthFailure>>,
    {
        let mut attempts = 1;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.is_retryable() && attempts < self.max_attempts => {
                    let delay = self.backoff.delay_with_hint(attempts, failure.retry_after);
                    tracing::debug!(
                        operation,
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        kind = %failure.kind,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempts += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast() -> RetryConfig {
        RetryConfig::default().with_backoff(
            ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2), 2.0)
                .with_jitter(0.0),
        )
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = fast()
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AuthFailure::new(AuthErrorKind::TransportFailure, "reset"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AuthFailure::new(AuthErrorKind::RateLimited, "slow down"))
            })
            .await;

        assert_eq!(result.unwrap_err().kind, AuthErrorKind::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_failure_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AuthFailure::new(AuthErrorKind::InvalidCredentials, "nope"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_as_long_as_server_asks() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = fast()
            .with_backoff(
                ExponentialBackoff::new(Duration::from_millis(200), Duration::from_secs(5), 2.0)
                    .with_jitter(0.0),
            )
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AuthFailure::new(AuthErrorKind::RateLimited, "slow down")
                        .with_retry_after(Duration::from_secs(2)))
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(3), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_wait_capped_at_ceiling() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = fast()
            .with_backoff(
                ExponentialBackoff::new(Duration::from_millis(200), Duration::from_secs(5), 2.0)
                    .with_jitter(0.0),
            )
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AuthFailure::new(AuthErrorKind::RateLimited, "slow down")
                        .with_retry_after(Duration::from_secs(3600)))
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(6), "waited {:?}", waited);
    }

    #[test]
    fn test_no_retry_config() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
        assert_eq!(RetryConfig::default().with_max_attempts(0).max_attempts, 1);
    }
}
