//! Wrapper combinators
//!
//! [`with_retry`] and [`with_circuit_breaker`] turn an operation factory into
//! a reusable callable carrying its resilience settings, so call sites do not
//! repeat the executor plumbing.
//!
//! ```rust,ignore
//! let fetch = with_retry(executor, "fetch_profile", policy, move || client.fetch(id));
//! let profile = fetch.call().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::circuit_breaker::CircuitBreakerRegistry;
use super::policy::RetryPolicy;
use super::retry::{RetryError, RetryExecutor};

/// Error returned by [`WithCircuitBreaker::call`]
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The call was rejected because the circuit is open
    #[error("circuit breaker open for operation '{operation}'")]
    Open { operation: String },

    /// The operation ran and failed
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Operation wrapped with retry semantics; see [`with_retry`]
pub struct WithRetry<F> {
    executor: Arc<RetryExecutor>,
    operation_name: String,
    policy: RetryPolicy,
    operation: F,
}

impl<F> std::fmt::Debug for WithRetry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithRetry")
            .field("operation_name", &self.operation_name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<F, Fut, T, E> WithRetry<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    pub async fn call(&self) -> Result<T, RetryError<E>> {
        self.executor
            .execute_with_retry(&self.operation_name, &self.policy, &self.operation)
            .await
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }
}

/// Wrap `operation` so every [`WithRetry::call`] runs it under `policy`
pub fn with_retry<F>(
    executor: Arc<RetryExecutor>,
    operation_name: impl Into<String>,
    policy: RetryPolicy,
    operation: F,
) -> WithRetry<F> {
    WithRetry { executor, operation_name: operation_name.into(), policy, operation }
}

/// Operation guarded by a circuit breaker; see [`with_circuit_breaker`]
pub struct WithCircuitBreaker<F> {
    registry: Arc<CircuitBreakerRegistry>,
    operation_name: String,
    operation: F,
}

impl<F> std::fmt::Debug for WithCircuitBreaker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithCircuitBreaker")
            .field("operation_name", &self.operation_name)
            .finish_non_exhaustive()
    }
}

impl<F, Fut, T, E> WithCircuitBreaker<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Run the operation once unless the circuit is open
    pub async fn call(&self) -> Result<T, CircuitBreakerError<E>> {
        if self.registry.is_open(&self.operation_name) {
            debug!(operation = %self.operation_name, "Circuit breaker rejecting call");
            return Err(CircuitBreakerError::Open { operation: self.operation_name.clone() });
        }

        match (self.operation)().await {
            Ok(value) => {
                self.registry.record_success(&self.operation_name);
                Ok(value)
            }
            Err(error) => {
                self.registry.record_failure(&self.operation_name);
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }
}

/// Wrap `operation` so every [`WithCircuitBreaker::call`] consults and feeds
/// the breaker named `operation_name`
pub fn with_circuit_breaker<F>(
    registry: Arc<CircuitBreakerRegistry>,
    operation_name: impl Into<String>,
    operation: F,
) -> WithCircuitBreaker<F> {
    WithCircuitBreaker { registry, operation_name: operation_name.into(), operation }
}
