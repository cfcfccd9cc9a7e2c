//! Retry Executor
//!
//! Runs an operation up to `policy.max_attempts()` times, consulting the
//! circuit breaker registry before every attempt and sleeping (without
//! blocking the runtime) between attempts.
//!
//! Only the last attempt's error reaches the caller. A call rejected by an
//! open circuit returns [`RetryError::CircuitOpen`], which callers can tell
//! apart from a real failure via [`RetryError::is_circuit_open`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::backoff::BackoffCalculator;
use super::circuit_breaker::CircuitBreakerRegistry;
use super::classify::classify_error;
use super::constants::{
    COMPONENT_RETRY_EXECUTOR, METRIC_CIRCUIT_REJECTIONS, METRIC_RETRY_ATTEMPTS,
    METRIC_RETRY_DELAY_MS, METRIC_RETRY_EXHAUSTED,
};
use super::policy::RetryPolicy;
use crate::error::ErrorSeverity;
use crate::observability::{ErrorLabels, MetricsCollector, NoOpMetricsCollector};

/// Terminal outcome of a failed retry loop
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The circuit for this operation was open; the attempt was not made
    #[error("circuit breaker open for operation '{operation}'")]
    CircuitOpen { operation: String, attempts: u32 },

    /// Every attempt failed with a retryable error
    #[error("operation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The error was not retryable, so no further attempts were made
    #[error("operation failed with non-retryable error: {source}")]
    NonRetryable {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// True when the call was rejected without reaching the operation
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. } => *attempts,
        }
    }

    /// The last real error, if the operation ran at all
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::Exhausted { source, .. } | Self::NonRetryable { source, .. } => Some(source),
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::Exhausted { source, .. } | Self::NonRetryable { source, .. } => Some(source),
        }
    }
}

/// Attempt statistics for one `execute_with_stats` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    /// Operation invocations (circuit rejections are not counted)
    pub attempts: u32,
    /// Sum of backoff delays slept
    pub total_delay: Duration,
}

/// Retry executor bound to a circuit breaker registry
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    breakers: Arc<CircuitBreakerRegistry>,
    backoff: Arc<BackoffCalculator>,
    metrics: Arc<dyn MetricsCollector>,
}

impl RetryExecutor {
    pub fn new(breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            breakers,
            backoff: Arc::new(BackoffCalculator::new()),
            metrics: Arc::new(NoOpMetricsCollector),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the backoff calculator (e.g. a seeded one in tests)
    pub fn with_backoff(mut self, backoff: Arc<BackoffCalculator>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn backoff(&self) -> &Arc<BackoffCalculator> {
        &self.backoff
    }

    /// Execute `operation` under `policy`, returning the value or the
    /// terminal error
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        operation_name: &str,
        policy: &RetryPolicy,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_with_stats(operation_name, policy, operation).await.0
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), also reporting
    /// attempt statistics
    pub async fn execute_with_stats<F, Fut, T, E>(
        &self,
        operation_name: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> (Result<T, RetryError<E>>, RetryStats)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let max_attempts = policy.max_attempts();
        let mut stats = RetryStats::default();

        loop {
            let attempt = stats.attempts + 1;

            if self.breakers.is_open(operation_name) {
                debug!(
                    operation = operation_name,
                    attempt, "Circuit open, rejecting call without invoking operation"
                );
                self.metrics
                    .increment_counter(METRIC_CIRCUIT_REJECTIONS, &[("operation", operation_name)]);
                let error = RetryError::CircuitOpen {
                    operation: operation_name.to_string(),
                    attempts: stats.attempts,
                };
                return (Err(error), stats);
            }

            debug!(operation = operation_name, attempt, max_attempts, "Executing operation");
            stats.attempts = attempt;

            let error = match operation().await {
                Ok(value) => {
                    self.breakers.record_success(operation_name);
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retries"
                        );
                    }
                    return (Ok(value), stats);
                }
                Err(error) => error,
            };

            self.breakers.record_failure(operation_name);
            let kind = classify_error(&error);

            if attempt >= max_attempts {
                warn!(
                    operation = operation_name,
                    attempt,
                    error_type = %kind,
                    error = %error,
                    "All retry attempts exhausted"
                );
                let labels =
                    ErrorLabels::new(
                        kind.as_label(),
                        COMPONENT_RETRY_EXECUTOR,
                        ErrorSeverity::Error,
                    );
                let [error_type, component, severity] = labels.as_pairs();
                self.metrics.increment_counter(
                    METRIC_RETRY_EXHAUSTED,
                    &[("operation", operation_name), error_type, component, severity],
                );
                return (Err(RetryError::Exhausted { attempts: attempt, source: error }), stats);
            }

            if !policy.should_retry(&error) {
                debug!(
                    operation = operation_name,
                    attempt,
                    error = %error,
                    "Error is not retryable, giving up"
                );
                return (Err(RetryError::NonRetryable { attempts: attempt, source: error }), stats);
            }

            let delay = self.backoff.delay(attempt, policy);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                delay_ms,
                error_type = %kind,
                error = %error,
                "Operation failed, retrying after backoff"
            );

            tokio::time::sleep(delay).await;
            stats.total_delay += delay;

            self.metrics.increment_counter(
                METRIC_RETRY_ATTEMPTS,
                &[("operation", operation_name), ("error_type", kind.as_label())],
            );
            self.metrics.record_timing(
                METRIC_RETRY_DELAY_MS,
                delay_ms,
                &[("operation", operation_name)],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the retry executor.
    //!
    //! Backoff sleeps run under tokio's paused clock, so they complete
    //! instantly while still advancing virtual time.

    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::resilience::{CircuitBreakerOverrides, CircuitState};
    use crate::testing::RecordingMetricsCollector;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(1))
            .jitter(false)
            .build()
            .unwrap()
    }

    fn transient(n: u32) -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, format!("attempt {n} timed out"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
        let (result, stats) = executor
            .execute_with_stats("op", &policy(3), || async { Ok::<_, io::Error>(7) })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(stats, RetryStats { attempts: 1, total_delay: Duration::ZERO });
    }

    /// Validates exhaustion: three retryable failures invoke the operation
    /// exactly three times and surface the third error.
    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
        let calls = AtomicU32::new(0);

        let (result, stats) = executor
            .execute_with_stats("op", &policy(3), || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err::<(), _>(transient(n)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(err.last_error().unwrap().to_string(), "attempt 3 timed out");
        assert_eq!(stats.total_delay, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuits() {
        let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
        let calls = AtomicU32::new(0);

        let result = executor
            .execute_with_retry("op", &policy(5), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(io::Error::new(io::ErrorKind::InvalidData, "validation failed"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_overrides_builtin_set() {
        let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::builder()
            .max_attempts(4)
            .base_delay(Duration::from_millis(10))
            .jitter(false)
            .retry_if(|e| e.to_string().contains("quota"))
            .build()
            .unwrap();

        let result = executor
            .execute_with_retry("op", &policy, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// Validates that an open circuit rejects calls without invoking the
    /// operation and that the sentinel is distinguishable.
    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_rejects_immediately() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        registry.configure("flaky", CircuitBreakerOverrides::new().failure_threshold(1)).unwrap();
        registry.record_failure("flaky");

        let metrics = RecordingMetricsCollector::new();
        let executor =
            RetryExecutor::new(Arc::clone(&registry)).with_metrics(Arc::new(metrics.clone()));
        let calls = AtomicU32::new(0);

        let result = executor
            .execute_with_retry("flaky", &policy(3), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, io::Error>(()) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_circuit_open());
        assert!(err.last_error().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.counter_total(METRIC_CIRCUIT_REJECTIONS), 1);
    }

    /// Validates that failures feed the breaker and that a breaker opened
    /// mid-loop stops further attempts.
    #[tokio::test(start_paused = true)]
    async fn test_failures_trip_breaker_mid_loop() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        registry.configure("svc", CircuitBreakerOverrides::new().failure_threshold(2)).unwrap();
        let executor = RetryExecutor::new(Arc::clone(&registry));
        let calls = AtomicU32::new(0);

        let result = executor
            .execute_with_retry("svc", &policy(5), || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err::<(), _>(transient(n)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let err = result.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(err.attempts(), 2);
        assert_eq!(registry.state("svc"), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_sequential_with_backoff() {
        let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
        let started = tokio::time::Instant::now();
        let timestamps = parking_lot::Mutex::new(Vec::new());

        let _ = executor
            .execute_with_retry("op", &policy(3), || {
                timestamps.lock().push(started.elapsed());
                async { Err::<(), _>(transient(0)) }
            })
            .await;

        let timestamps = timestamps.into_inner();
        assert_eq!(
            timestamps,
            vec![Duration::ZERO, Duration::from_millis(100), Duration::from_millis(300)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_emitted_per_retry_and_exhaustion() {
        let metrics = RecordingMetricsCollector::new();
        let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()))
            .with_metrics(Arc::new(metrics.clone()));

        let _ = executor
            .execute_with_retry("upload", &policy(3), || async {
                Err::<(), _>(io::Error::new(io::ErrorKind::Other, "503 Service Unavailable"))
            })
            .await;

        assert_eq!(metrics.counter_total(METRIC_RETRY_ATTEMPTS), 2);
        assert_eq!(metrics.counter_total(METRIC_RETRY_EXHAUSTED), 1);
        assert_eq!(
            metrics.counter_with_label(METRIC_RETRY_EXHAUSTED, "error_type", "upstream_5xx"),
            1
        );
        assert_eq!(
            metrics.counter_with_label(METRIC_RETRY_EXHAUSTED, "component", "retry_executor"),
            1
        );
        assert_eq!(metrics.histogram_values(METRIC_RETRY_DELAY_MS), vec![100.0, 200.0]);
    }
}
