//! Retry policy value object
//!
//! A [`RetryPolicy`] is immutable once built. Construct one with
//! [`RetryPolicy::builder`], which validates the combination of limits, or use
//! [`RetryPolicy::default`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::classify::is_builtin_retryable;
use super::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
    MAX_MAX_ATTEMPTS, MIN_MAX_ATTEMPTS,
};
use crate::error::{CommonError, CommonResult};

/// Caller-supplied decision on whether an error is worth retrying
pub type ErrorPredicate = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// How many times to attempt an operation and how long to wait in between
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter: bool,
    retry_predicate: Option<ErrorPredicate>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter", &self.jitter)
            .field("retry_predicate", &self.retry_predicate.as_ref().map(|_| "<function>"))
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            jitter: true,
            retry_predicate: None,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    pub fn has_predicate(&self) -> bool {
        self.retry_predicate.is_some()
    }

    /// Decide whether `error` should be retried
    ///
    /// A configured predicate is authoritative. Without one, the built-in
    /// transient set (connection reset/refused, timeouts, DNS failures and
    /// 502/503/504 responses) decides.
    pub fn should_retry(&self, error: &(dyn std::error::Error + 'static)) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => is_builtin_retryable(error),
        }
    }

    fn validate(&self) -> CommonResult<()> {
        if !(MIN_MAX_ATTEMPTS..=MAX_MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(CommonError::config_field(
                "max_attempts",
                format!(
                    "must be between {} and {}, got {}",
                    MIN_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS, self.max_attempts
                ),
            ));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(CommonError::config_field(
                "backoff_factor",
                format!("must be a finite value >= 1.0, got {}", self.backoff_factor),
            ));
        }

        if self.base_delay > self.max_delay {
            return Err(CommonError::config_field(
                "base_delay",
                format!(
                    "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                    self.base_delay, self.max_delay
                ),
            ));
        }

        Ok(())
    }
}

/// Builder for [`RetryPolicy`]
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.policy.backoff_factor = factor;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.policy.jitter = enabled;
        self
    }

    /// Replace the built-in retryable set with a custom predicate
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.policy.retry_predicate = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> CommonResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
