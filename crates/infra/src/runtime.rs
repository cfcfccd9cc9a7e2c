//! Runtime wiring for the dead-letter queue.
//!
//! [`DlqRuntime`] builds the whole stack from a [`ReboundConfig`] and three
//! ports: circuit breaker registry, retry executor, DLQ service and the
//! background scheduler. The scheduler starts with the runtime and stops on
//! [`DlqRuntime::shutdown`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rebound_common::NoOpMetricsCollector;
//! use rebound_domain::ReboundConfig;
//! use rebound_infra::adapters::{BroadcastEventBus, InMemoryBroker, InMemoryKeyValueStore};
//! use rebound_infra::DlqRuntime;
//!
//! # async fn example() -> rebound_domain::Result<()> {
//! let mut runtime = DlqRuntime::start(
//!     ReboundConfig::default(),
//!     Arc::new(InMemoryKeyValueStore::new()),
//!     Arc::new(InMemoryBroker::new()),
//!     Arc::new(BroadcastEventBus::default()),
//!     Arc::new(NoOpMetricsCollector),
//! )
//! .await?;
//!
//! let service = runtime.service();
//! // ... workers call service.admit_failure(..) ...
//!
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use rebound_common::observability::{MetricsCollector, NoOpMetricsCollector};
use rebound_common::resilience::{
    CircuitBreakerOverrides, CircuitBreakerRegistry, RetryExecutor, RetryPolicy,
};
use rebound_common::testing::{Clock, SystemClock};
use rebound_common::CommonError;
use rebound_core::{DlqService, EventPublisher, KeyValueStore, MessagePublisher};
use rebound_domain::{ReboundConfig, ReboundError, Result};
use tracing::{info, instrument};

use crate::scheduling::{RetryScheduler, RetrySchedulerConfig};

/// Attempts per re-publication before the scan gives up on a pointer
pub const DELIVERY_MAX_ATTEMPTS: u32 = 3;
pub const DELIVERY_BASE_DELAY: Duration = Duration::from_millis(200);
pub const DELIVERY_MAX_DELAY: Duration = Duration::from_secs(2);

fn config_error(err: CommonError) -> ReboundError {
    ReboundError::Config(err.to_string())
}

/// Policy used for re-publishing stored payloads onto origin queues
pub fn delivery_policy() -> Result<RetryPolicy> {
    RetryPolicy::builder()
        .max_attempts(DELIVERY_MAX_ATTEMPTS)
        .base_delay(DELIVERY_BASE_DELAY)
        .max_delay(DELIVERY_MAX_DELAY)
        .build()
        .map_err(config_error)
}

/// Builder for [`DlqRuntime`]
///
/// Store, publisher and event bus are required; metrics default to no-op and
/// the clock to system time.
pub struct DlqRuntimeBuilder {
    config: ReboundConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    publisher: Option<Arc<dyn MessagePublisher>>,
    events: Option<Arc<dyn EventPublisher>>,
    metrics: Arc<dyn MetricsCollector>,
    clock: Arc<dyn Clock>,
}

impl DlqRuntimeBuilder {
    pub fn new(config: ReboundConfig) -> Self {
        Self {
            config,
            store: None,
            publisher: None,
            events: None,
            metrics: Arc::new(NoOpMetricsCollector),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Clock shared by the breakers and the DLQ service
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration, wire every component and start the scheduler
    ///
    /// # Errors
    ///
    /// Returns `ReboundError::Config` for invalid configuration or a missing
    /// port, and `ReboundError::Internal` if the scheduler cannot start.
    #[instrument(skip(self))]
    pub async fn start(self) -> Result<DlqRuntime> {
        let Self { config, store, publisher, events, metrics, clock } = self;
        let missing = |port: &str| ReboundError::Config(format!("DLQ runtime needs a {port}"));
        let store = store.ok_or_else(|| missing("key-value store"))?;
        let publisher = publisher.ok_or_else(|| missing("message publisher"))?;
        let events = events.ok_or_else(|| missing("event publisher"))?;

        config.validate()?;

        let breakers = Arc::new(
            CircuitBreakerRegistry::new()
                .with_clock(Arc::clone(&clock))
                .with_metrics(Arc::clone(&metrics)),
        );
        for (operation, settings) in &config.circuit_breakers {
            let mut overrides = CircuitBreakerOverrides::new();
            if let Some(threshold) = settings.failure_threshold {
                overrides = overrides.failure_threshold(threshold);
            }
            if let Some(timeout) = settings.recovery_timeout {
                overrides = overrides.recovery_timeout(timeout);
            }
            breakers.configure(operation, overrides).map_err(config_error)?;
        }

        let executor =
            Arc::new(RetryExecutor::new(Arc::clone(&breakers)).with_metrics(Arc::clone(&metrics)));

        let service = Arc::new(
            DlqService::new(store, publisher, events)
                .with_settings(&config.dlq)
                .with_clock(clock)
                .with_metrics(Arc::clone(&metrics))
                .with_delivery_retry(Arc::clone(&executor), delivery_policy()?),
        );

        let mut scheduler =
            RetryScheduler::new(Arc::clone(&service), RetrySchedulerConfig::from(&config.dlq))
                .with_metrics(metrics);
        scheduler.start().await?;

        info!(
            queues = config.dlq.queues.len(),
            circuit_breakers = config.circuit_breakers.len(),
            "DLQ runtime started"
        );

        Ok(DlqRuntime { config, breakers, executor, service, scheduler })
    }
}

/// Running DLQ stack
#[derive(Debug)]
pub struct DlqRuntime {
    config: ReboundConfig,
    breakers: Arc<CircuitBreakerRegistry>,
    executor: Arc<RetryExecutor>,
    service: Arc<DlqService>,
    scheduler: RetryScheduler,
}

impl DlqRuntime {
    pub fn builder(config: ReboundConfig) -> DlqRuntimeBuilder {
        DlqRuntimeBuilder::new(config)
    }

    /// Wire the stack with the system clock and start the scheduler
    ///
    /// # Errors
    ///
    /// See [`DlqRuntimeBuilder::start`].
    pub async fn start(
        config: ReboundConfig,
        store: Arc<dyn KeyValueStore>,
        publisher: Arc<dyn MessagePublisher>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Result<Self> {
        DlqRuntimeBuilder::new(config)
            .store(store)
            .publisher(publisher)
            .events(events)
            .metrics(metrics)
            .start()
            .await
    }

    pub fn config(&self) -> &ReboundConfig {
        &self.config
    }

    pub fn service(&self) -> Arc<DlqService> {
        Arc::clone(&self.service)
    }

    pub fn breakers(&self) -> Arc<CircuitBreakerRegistry> {
        Arc::clone(&self.breakers)
    }

    /// Executor for worker code, sharing the runtime's breakers and metrics
    pub fn executor(&self) -> Arc<RetryExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Stop the background loops
    ///
    /// # Errors
    ///
    /// Returns `ReboundError::InvalidInput` if already shut down, or
    /// `ReboundError::Internal` if a loop does not exit in time.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.stop().await?;
        info!("DLQ runtime stopped");
        Ok(())
    }
}
