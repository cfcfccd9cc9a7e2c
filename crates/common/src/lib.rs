//! Resilience building blocks shared across rebound crates.
//!
//! # Feature Tiers
//!
//! - `foundation`: error taxonomy, error labels, metrics traits
//! - `observability`: tracing integration
//! - `runtime`: circuit breakers, retry executor, backoff, Prometheus
//!   collector, clock abstraction (enabled by default)
//! - `test-utils`: recording collectors and assertions for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
#[macro_use]
pub mod error;
#[cfg(feature = "foundation")]
pub mod observability;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities (clock abstraction is also used at runtime)
// ---------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod testing;

#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "foundation")]
pub use observability::{ErrorLabels, MetricsCollector, NoOpMetricsCollector};
#[cfg(feature = "runtime")]
pub use resilience::{
    with_circuit_breaker, with_retry, with_timeout, BackoffCalculator, CircuitBreakerOverrides,
    CircuitBreakerRegistry, CircuitState, RetryError, RetryExecutor, RetryPolicy,
};
#[cfg(feature = "runtime")]
pub use testing::{Clock, MockClock, SystemClock};
