//! Timeout race helper
//!
//! The retry executor never bounds an attempt's duration. Callers that need a
//! deadline wrap the operation's future with [`with_timeout`] before handing
//! it to the executor; the elapsed error's message contains "timed out", so
//! the built-in retryable set treats it as transient.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Error returned by [`with_timeout`]
#[derive(Debug, Error)]
pub enum TimeoutError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The deadline passed before the operation finished
    #[error("operation '{operation}' timed out after {duration:?}")]
    Elapsed { operation: String, duration: Duration },

    /// The operation finished in time but failed
    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn is_elapsed(&self) -> bool {
        matches!(self, Self::Elapsed { .. })
    }
}

/// Race `future` against a timer of `duration`
pub async fn with_timeout<F, T, E>(
    operation: &str,
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result.map_err(TimeoutError::Inner),
        Err(_) => {
            warn!(
                operation,
                timeout_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                "Operation timed out"
            );
            Err(TimeoutError::Elapsed { operation: operation.to_string(), duration })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::resilience::{
        is_builtin_retryable, CircuitBreakerRegistry, RetryExecutor, RetryPolicy,
    };

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_when_future_is_slow() {
        let result = with_timeout("slow", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, io::Error>(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_elapsed());
        assert!(err.to_string().contains("timed out"));
        assert!(is_builtin_retryable(&err));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_result_passes_through() {
        let ok =
            with_timeout("fast", Duration::from_secs(1), async { Ok::<_, io::Error>(5) }).await;
        assert_eq!(ok.unwrap(), 5);

        let err = with_timeout("fast", Duration::from_secs(1), async {
            Err::<(), _>(io::Error::new(io::ErrorKind::Other, "bad input"))
        })
        .await
        .unwrap_err();
        assert!(!err.is_elapsed());
        assert_eq!(err.to_string(), "bad input");
    }

    /// Validates the intended composition: a timed-out attempt is retried by
    /// the executor.
    #[tokio::test(start_paused = true)]
    async fn test_timeout_composes_with_retry() {
        let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
        let policy = RetryPolicy::builder()
            .max_attempts(3)
            .base_delay(Duration::from_millis(10))
            .jitter(false)
            .build()
            .unwrap();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute_with_retry("hanging", &policy, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                with_timeout("hanging", Duration::from_millis(100), async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok::<_, io::Error>(n)
                })
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
