//! Retry policy for calls to upstream services.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config;
use crate::error::Result;

/// Retry transient failures a bounded number of times.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&config::Retry::default())
    }
}

impl RetryPolicy {
    /// Create a new [`RetryPolicy`]. `attempts` counts the first call.
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &config::Retry) -> Self {
        Self::new(config.attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Run `operation` until it succeeds, fails for good, or attempts run out.
    pub async fn run<T, F, Fut>(
        &self,
        service: &'static str,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    tracing::warn!(
                        %service,
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "upstream request failed, will retry"
                    );
                    sleep(self.backoff).await;
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ServerError;

    fn unavailable() -> ServerError {
        ServerError::ServiceUnavailable {
            service: "translator",
            details: "connection reset".into(),
        }
    }

    #[tokio::test]
    async fn test_retry_once_then_succeed() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let value = policy
            .run("translator", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(unavailable())
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_is_unavailable() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<()> = policy
            .run("translator", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            })
            .await;

        assert!(matches!(result, Err(ServerError::ServiceUnavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<()> = policy
            .run("classifier", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServerError::NotFound("model".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
