// Constants for the resilience module
use std::time::Duration;

/// Default maximum number of attempts (first call included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default growth factor between consecutive delays
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Jitter spread as a fraction of the capped delay (±25%)
pub const JITTER_RATIO: f64 = 0.25;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Minimum allowed max_attempts value
pub const MIN_MAX_ATTEMPTS: u32 = 1;

/// Maximum allowed max_attempts value
pub const MAX_MAX_ATTEMPTS: u32 = 100;

/// Circuit breaker: default failure threshold
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Circuit breaker: default time an open circuit waits before half-opening
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker: consecutive half-open successes needed to close
pub const HALF_OPEN_SUCCESS_QUOTA: u32 = 3;

/// Metric: one increment per scheduled retry
pub const METRIC_RETRY_ATTEMPTS: &str = "retry_attempts_total";

/// Metric: one increment per exhausted retry loop
pub const METRIC_RETRY_EXHAUSTED: &str = "retry_exhausted_total";

/// Metric: calls rejected because the circuit was open
pub const METRIC_CIRCUIT_REJECTIONS: &str = "retry_circuit_rejections_total";

/// Metric: histogram of computed backoff delays in milliseconds
pub const METRIC_RETRY_DELAY_MS: &str = "retry_delay_ms";

/// Metric: circuit breaker state transitions
pub const METRIC_CIRCUIT_TRANSITIONS: &str = "circuit_breaker_transitions_total";

/// Component label used by the retry executor
pub const COMPONENT_RETRY_EXECUTOR: &str = "retry_executor";
