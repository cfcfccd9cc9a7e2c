//! Per-queue DLQ configuration registry
//!
//! Precedence when resolving a queue's policy: call-site overrides, then the
//! overrides registered for the queue, then the global defaults.

use std::collections::HashMap;

use parking_lot::RwLock;
use rebound_common::resilience::constants::{MAX_MAX_ATTEMPTS, MIN_MAX_ATTEMPTS};
use rebound_common::resilience::RetryPolicy;
use rebound_domain::{
    validate_queue_name, DlqConfig, DlqConfigOverrides, DlqSettings, ReboundError, Result,
};
use tracing::info;

#[derive(Debug)]
pub struct QueueConfigRegistry {
    defaults: DlqConfig,
    queues: RwLock<HashMap<String, DlqConfigOverrides>>,
}

impl Default for QueueConfigRegistry {
    fn default() -> Self {
        Self::new(DlqConfig::default())
    }
}

impl QueueConfigRegistry {
    pub fn new(defaults: DlqConfig) -> Self {
        Self { defaults, queues: RwLock::new(HashMap::new()) }
    }

    pub fn from_settings(settings: &DlqSettings) -> Self {
        Self { defaults: settings.defaults.clone(), queues: RwLock::new(settings.queues.clone()) }
    }

    pub fn defaults(&self) -> &DlqConfig {
        &self.defaults
    }

    /// Registered policy for `queue`
    pub fn get(&self, queue: &str) -> DlqConfig {
        match self.queues.read().get(queue) {
            Some(overrides) => self.defaults.merged(overrides),
            None => self.defaults.clone(),
        }
    }

    /// Policy for `queue` with `call_site` layered on top
    pub fn resolve(
        &self,
        queue: &str,
        call_site: Option<&DlqConfigOverrides>,
    ) -> Result<DlqConfig> {
        let registered = self.get(queue);
        match call_site {
            Some(overrides) if !overrides.is_empty() => {
                let merged = registered.merged(overrides);
                merged.validate()?;
                Ok(merged)
            }
            _ => Ok(registered),
        }
    }

    /// Layer `overrides` onto whatever is registered for `queue`
    ///
    /// The combined policy is validated before it replaces the old one.
    pub fn configure(&self, queue: &str, overrides: &DlqConfigOverrides) -> Result<DlqConfig> {
        validate_queue_name(queue)?;
        let mut queues = self.queues.write();
        let combined = queues
            .get(queue)
            .map_or_else(|| overrides.clone(), |existing| existing.overlay(overrides));
        let effective = self.defaults.merged(&combined);
        effective.validate()?;
        queues.insert(queue.to_string(), combined);
        info!(
            %queue,
            max_retries = effective.max_retries,
            alert_threshold = effective.alert_threshold,
            "Configured DLQ queue"
        );
        Ok(effective)
    }

    /// Queues with registered overrides
    pub fn queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Backoff policy used to compute `next_retry_at` for a queue
pub fn backoff_policy(config: &DlqConfig) -> Result<RetryPolicy> {
    RetryPolicy::builder()
        .max_attempts(config.max_retries.clamp(MIN_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS))
        .base_delay(config.base_delay)
        .max_delay(config.max_delay)
        .backoff_factor(config.backoff_factor)
        .jitter(config.enable_jitter)
        .build()
        .map_err(|e| ReboundError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_precedence() {
        let registry = QueueConfigRegistry::default();
        registry
            .configure("emails", &DlqConfigOverrides::new().max_retries(2).alert_threshold(5))
            .unwrap();

        let resolved = registry
            .resolve("emails", Some(&DlqConfigOverrides::new().max_retries(1)))
            .unwrap();
        assert_eq!(resolved.max_retries, 1);
        assert_eq!(resolved.alert_threshold, 5);
        assert_eq!(registry.get("sms"), DlqConfig::default());
    }

    #[test]
    fn test_configure_accumulates_and_validates() {
        let registry = QueueConfigRegistry::default();
        registry.configure("emails", &DlqConfigOverrides::new().max_retries(2)).unwrap();
        registry.configure("emails", &DlqConfigOverrides::new().enable_jitter(false)).unwrap();

        let config = registry.get("emails");
        assert_eq!(config.max_retries, 2);
        assert!(!config.enable_jitter);

        let err = registry
            .configure("emails", &DlqConfigOverrides::new().backoff_factor(0.2))
            .unwrap_err();
        assert_eq!(err.kind(), "config");
        assert_eq!(registry.get("emails").backoff_factor, 2.0);
        assert!(registry.configure("", &DlqConfigOverrides::new()).is_err());
        assert_eq!(registry.queues(), vec!["emails".to_string()]);
    }

    #[test]
    fn test_invalid_call_site_overrides_rejected() {
        let registry = QueueConfigRegistry::default();
        let bad = DlqConfigOverrides::new().base_delay(Duration::from_secs(7200));
        assert!(registry.resolve("emails", Some(&bad)).is_err());
        assert!(registry.resolve("emails", None).is_ok());
    }

    #[test]
    fn test_backoff_policy_mirrors_config() {
        let mut config = DlqConfig::default();
        config.max_retries = 0;
        config.enable_jitter = false;
        let policy = backoff_policy(&config).unwrap();

        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.base_delay(), Duration::from_secs(30));
        assert!(!policy.jitter());
    }
}
