//! Resilience patterns for calling flaky dependencies
//!
//! Components, leaves first:
//! - **Backoff Calculator** ([`backoff`]): attempt number + policy -> delay
//! - **Circuit Breaker Registry** ([`circuit_breaker`]): per-operation
//!   closed/open/half-open state machine
//! - **Retry Executor** ([`retry`]): wraps an operation, consults the
//!   registry, sleeps between attempts and emits telemetry
//!
//! Around these sit the [`combinators`] (`with_retry`,
//! `with_circuit_breaker`), the [`timeout`] race helper and the built-in
//! transient error detection in [`classify`].
//!
//! Registries are plain values. Create one per process (or per test) and
//! share it with `Arc`; nothing here is a global singleton.

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod combinators;
pub mod constants;
pub mod policy;
pub mod retry;
pub mod timeout;

pub use backoff::{capped_delay, compute_delay, BackoffCalculator};
pub use circuit_breaker::{
    CircuitBreakerOptions, CircuitBreakerOverrides, CircuitBreakerRegistry,
    CircuitBreakerSnapshot, CircuitState,
};
pub use classify::{classify_error, is_builtin_retryable, TransientKind};
pub use combinators::{
    with_circuit_breaker, with_retry, CircuitBreakerError, WithCircuitBreaker, WithRetry,
};
pub use constants::HALF_OPEN_SUCCESS_QUOTA;
pub use policy::{ErrorPredicate, RetryPolicy, RetryPolicyBuilder};
pub use retry::{RetryError, RetryExecutor, RetryStats};
pub use timeout::{with_timeout, TimeoutError};
