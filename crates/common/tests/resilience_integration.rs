//! Integration tests for the resilience module
//!
//! Exercises the backoff calculator, circuit breaker registry and retry
//! executor together through the public API, the way worker code uses them.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rebound_common::observability::PrometheusMetricsCollector;
use rebound_common::resilience::{
    with_retry, with_timeout, BackoffCalculator, CircuitBreakerOverrides, CircuitBreakerRegistry,
    CircuitState, RetryError, RetryExecutor, RetryPolicy,
};
use rebound_common::testing::{assert_duration_between, MockClock, RecordingMetricsCollector};

/// Custom error type for testing
#[derive(Debug, Clone)]
struct TestError {
    message: String,
}

impl TestError {
    fn new(message: &str) -> Self {
        Self { message: message.to_string() }
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .base_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(100))
        .backoff_factor(2.0)
        .jitter(false)
        .build()
        .expect("valid policy")
}

/// Validates recovery from transient failures with exponential backoff.
///
/// # Test Steps
/// 1. Operation fails with "connection reset" three times
/// 2. Fourth attempt succeeds
/// 3. Verify four invocations and 10 + 20 + 40 ms of backoff
#[tokio::test(start_paused = true)]
async fn test_retry_recovers_from_transient_failures() {
    let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = Arc::clone(&attempts);

    let (result, stats) = executor
        .execute_with_stats("fetch_document", &fast_policy(5), || {
            let count = attempts_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 3 {
                    Err(TestError::new("connection reset by peer"))
                } else {
                    Ok("document")
                }
            }
        })
        .await;

    assert_eq!(result.expect("should succeed"), "document");
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(stats.attempts, 4);
    assert_eq!(stats.total_delay, Duration::from_millis(70));
}

/// Validates that a non-retryable error is attempted exactly once.
#[tokio::test(start_paused = true)]
async fn test_validation_error_is_not_retried() {
    let executor = RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new()));
    let attempts = AtomicU32::new(0);

    let result: Result<(), _> = executor
        .execute_with_retry("score_resume", &fast_policy(10), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::new("validation failed: missing field")) }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    match result {
        Err(RetryError::NonRetryable { source, attempts }) => {
            assert_eq!(attempts, 1);
            assert_eq!(source.message, "validation failed: missing field");
        }
        other => panic!("expected NonRetryable, got {other:?}"),
    }
}

/// Validates the full breaker lifecycle as seen by the executor.
///
/// # Test Steps
/// 1. Threshold 3: one exhausted call of 3 attempts opens the circuit
/// 2. Next call is rejected with the circuit-open sentinel
/// 3. After the recovery timeout, three successful calls close it again
#[tokio::test(start_paused = true)]
async fn test_executor_drives_breaker_lifecycle() {
    let clock = MockClock::new();
    let registry = Arc::new(CircuitBreakerRegistry::new().with_clock(Arc::new(clock.clone())));
    registry
        .configure(
            "ai_api",
            CircuitBreakerOverrides::new()
                .failure_threshold(3)
                .recovery_timeout(Duration::from_secs(30)),
        )
        .expect("valid overrides");
    let executor = RetryExecutor::new(Arc::clone(&registry));

    let failed: Result<(), _> = executor
        .execute_with_retry("ai_api", &fast_policy(3), || async {
            Err(TestError::new("503 Service Unavailable"))
        })
        .await;
    assert!(matches!(failed, Err(RetryError::Exhausted { attempts: 3, .. })));
    assert_eq!(registry.state("ai_api"), CircuitState::Open);

    let rejected = executor
        .execute_with_retry("ai_api", &fast_policy(3), || async { Ok::<_, TestError>(()) })
        .await;
    assert!(rejected.expect_err("circuit should be open").is_circuit_open());

    clock.advance(Duration::from_secs(30));
    for _ in 0..3 {
        executor
            .execute_with_retry("ai_api", &fast_policy(1), || async { Ok::<_, TestError>(()) })
            .await
            .expect("trial call should pass");
    }
    assert_eq!(registry.state("ai_api"), CircuitState::Closed);
}

/// Validates jitter bounds over many draws from a seeded calculator.
#[test]
fn test_jitter_stays_within_quarter_band() {
    let calculator = BackoffCalculator::seeded(2024);
    let policy = RetryPolicy::builder()
        .base_delay(Duration::from_millis(200))
        .max_delay(Duration::from_secs(10))
        .backoff_factor(3.0)
        .jitter(true)
        .build()
        .expect("valid policy");

    for attempt in 1..=6 {
        let nominal = rebound_common::resilience::capped_delay(attempt, &policy);
        for _ in 0..100 {
            let delay = calculator.delay(attempt, &policy);
            let min = nominal.mul_f64(0.75).saturating_sub(Duration::from_micros(1));
            let max = nominal.mul_f64(1.25).min(policy.max_delay()) + Duration::from_micros(1);
            assert_duration_between(delay, min, max);
        }
    }
}

/// Validates the `with_retry` combinator plus the timeout helper against a
/// Prometheus-backed executor.
#[tokio::test(start_paused = true)]
async fn test_combinator_with_timeout_and_prometheus() {
    let metrics = Arc::new(PrometheusMetricsCollector::new());
    let executor = Arc::new(
        RetryExecutor::new(Arc::new(CircuitBreakerRegistry::new())).with_metrics(metrics.clone()),
    );
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let call = with_retry(executor, "generate_questions", fast_policy(3), move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        with_timeout("generate_questions", Duration::from_millis(50), async move {
            if n == 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok::<_, TestError>(n)
        })
    });

    assert_eq!(call.call().await.expect("second attempt succeeds"), 1);

    let text = metrics.gather_text().expect("text export");
    assert!(text.contains("retry_attempts_total"));
    assert!(text.contains("error_type=\"timeout\""));
}

/// Validates that breaker transitions are reported to the metrics sink.
#[tokio::test]
async fn test_transition_metrics_reported() {
    let metrics = RecordingMetricsCollector::new();
    let registry = CircuitBreakerRegistry::new().with_metrics(Arc::new(metrics.clone()));
    registry
        .configure("storage", CircuitBreakerOverrides::new().failure_threshold(1))
        .expect("valid overrides");

    registry.record_failure("storage");
    assert!(registry.reset("storage"));

    assert_eq!(metrics.counter_with_label("circuit_breaker_transitions_total", "to", "OPEN"), 1);
    assert_eq!(
        metrics.counter_with_label("circuit_breaker_transitions_total", "to", "CLOSED"),
        1
    );
}
