//! Configuration structures
//!
//! [`ReboundConfig`] is the root document read by the loader in
//! `rebound-infra`. Every section has defaults, so an empty file is valid.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALERT_THRESHOLD, DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_CLAIM_TTL,
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_ENABLE_JITTER, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    DEFAULT_RETENTION_PERIOD, DEFAULT_SCAN_INTERVAL, DEFAULT_SCAN_TIMEOUT, MAX_RETENTION_PERIOD,
    MAX_RETRY_DELAY,
};
use crate::errors::{ReboundError, Result};
use crate::serde_utils::{
    duration_millis, duration_secs, option_duration_millis, option_duration_secs,
};

/// Per-queue DLQ policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlqConfig {
    /// Scheduled re-deliveries before a message becomes permanent
    pub max_retries: u32,
    #[serde(rename = "base_delay_ms", with = "duration_millis")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_millis")]
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub enable_jitter: bool,
    /// TTL of stored records; permanent records expire after this long
    #[serde(rename = "retention_secs", with = "duration_secs")]
    pub retention_period: Duration,
    /// Permanent messages in one queue that trigger a threshold alert
    pub alert_threshold: u32,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            enable_jitter: DEFAULT_ENABLE_JITTER,
            retention_period: DEFAULT_RETENTION_PERIOD,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

impl DlqConfig {
    /// Copy of `self` with every `Some` field of `overrides` applied
    pub fn merged(&self, overrides: &DlqConfigOverrides) -> Self {
        Self {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            base_delay: overrides.base_delay.unwrap_or(self.base_delay),
            max_delay: overrides.max_delay.unwrap_or(self.max_delay),
            backoff_factor: overrides.backoff_factor.unwrap_or(self.backoff_factor),
            enable_jitter: overrides.enable_jitter.unwrap_or(self.enable_jitter),
            retention_period: overrides.retention_period.unwrap_or(self.retention_period),
            alert_threshold: overrides.alert_threshold.unwrap_or(self.alert_threshold),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ReboundError::Config(format!(
                "backoff_factor must be a finite value >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(ReboundError::Config(format!(
                "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }
        if self.max_delay > MAX_RETRY_DELAY {
            return Err(ReboundError::Config(format!(
                "max_delay ({:?}) exceeds the {MAX_RETRY_DELAY:?} limit",
                self.max_delay
            )));
        }
        if self.retention_period.is_zero() {
            return Err(ReboundError::Config("retention_period must be greater than 0".into()));
        }
        if self.retention_period > MAX_RETENTION_PERIOD {
            return Err(ReboundError::Config(format!(
                "retention_period ({:?}) exceeds the {MAX_RETENTION_PERIOD:?} limit",
                self.retention_period
            )));
        }
        Ok(())
    }
}

/// Queue names become part of store keys and scan patterns, so they must be
/// non-empty and free of the `*` wildcard.
pub fn validate_queue_name(queue: &str) -> Result<()> {
    if queue.trim().is_empty() {
        return Err(ReboundError::InvalidInput("queue name must not be empty".into()));
    }
    if queue.contains('*') {
        return Err(ReboundError::InvalidInput(format!(
            "queue name '{queue}' must not contain '*'"
        )));
    }
    Ok(())
}

/// Partial [`DlqConfig`]; `None` fields fall through to the layer below
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlqConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(
        rename = "base_delay_ms",
        with = "option_duration_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_delay: Option<Duration>,
    #[serde(
        rename = "max_delay_ms",
        with = "option_duration_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_delay: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_jitter: Option<bool>,
    #[serde(
        rename = "retention_secs",
        with = "option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub retention_period: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_threshold: Option<u32>,
}

impl DlqConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, value: u32) -> Self {
        self.max_retries = Some(value);
        self
    }

    pub fn base_delay(mut self, value: Duration) -> Self {
        self.base_delay = Some(value);
        self
    }

    pub fn max_delay(mut self, value: Duration) -> Self {
        self.max_delay = Some(value);
        self
    }

    pub fn backoff_factor(mut self, value: f64) -> Self {
        self.backoff_factor = Some(value);
        self
    }

    pub fn enable_jitter(mut self, value: bool) -> Self {
        self.enable_jitter = Some(value);
        self
    }

    pub fn retention_period(mut self, value: Duration) -> Self {
        self.retention_period = Some(value);
        self
    }

    pub fn alert_threshold(mut self, value: u32) -> Self {
        self.alert_threshold = Some(value);
        self
    }

    /// Layer `other` on top of `self` (fields set in `other` win)
    pub fn overlay(&self, other: &DlqConfigOverrides) -> Self {
        Self {
            max_retries: other.max_retries.or(self.max_retries),
            base_delay: other.base_delay.or(self.base_delay),
            max_delay: other.max_delay.or(self.max_delay),
            backoff_factor: other.backoff_factor.or(self.backoff_factor),
            enable_jitter: other.enable_jitter.or(self.enable_jitter),
            retention_period: other.retention_period.or(self.retention_period),
            alert_threshold: other.alert_threshold.or(self.alert_threshold),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// DLQ section: global defaults, per-queue overrides and loop timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlqSettings {
    pub defaults: DlqConfig,
    pub queues: HashMap<String, DlqConfigOverrides>,
    #[serde(rename = "scan_interval_secs", with = "duration_secs")]
    pub scan_interval: Duration,
    #[serde(rename = "cleanup_interval_secs", with = "duration_secs")]
    pub cleanup_interval: Duration,
    #[serde(rename = "claim_ttl_secs", with = "duration_secs")]
    pub claim_ttl: Duration,
    #[serde(rename = "scan_timeout_secs", with = "duration_secs")]
    pub scan_timeout: Duration,
}

impl Default for DlqSettings {
    fn default() -> Self {
        Self {
            defaults: DlqConfig::default(),
            queues: HashMap::new(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            claim_ttl: DEFAULT_CLAIM_TTL,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

impl DlqSettings {
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;
        for (queue, overrides) in &self.queues {
            validate_queue_name(queue).map_err(|e| ReboundError::Config(e.to_string()))?;
            self.defaults
                .merged(overrides)
                .validate()
                .map_err(|e| ReboundError::Config(format!("queue '{queue}': {e}")))?;
        }
        for (name, value) in [
            ("scan_interval", self.scan_interval),
            ("cleanup_interval", self.cleanup_interval),
            ("claim_ttl", self.claim_ttl),
            ("scan_timeout", self.scan_timeout),
        ] {
            if value.is_zero() {
                return Err(ReboundError::Config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}

/// Per-operation circuit breaker overrides from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(
        rename = "recovery_timeout_secs",
        with = "option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub recovery_timeout: Option<Duration>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// Single-line human-readable output
    Compact,
    /// One JSON object per line
    Json,
}

crate::impl_domain_status_conversions!(LogFormat {
    Pretty => "pretty",
    Compact => "compact",
    Json => "json",
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info,rebound_core=debug`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReboundConfig {
    pub dlq: DlqSettings,
    pub circuit_breakers: HashMap<String, CircuitBreakerSettings>,
    pub logging: LoggingConfig,
}

impl ReboundConfig {
    pub fn validate(&self) -> Result<()> {
        self.dlq.validate()?;
        for (operation, settings) in &self.circuit_breakers {
            if settings.failure_threshold == Some(0) {
                return Err(ReboundError::Config(format!(
                    "circuit breaker '{operation}': failure_threshold must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}
