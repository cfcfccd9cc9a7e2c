//! Background retry scheduler for the dead-letter queue.
//!
//! Runs two loops against a shared [`DlqService`]:
//!
//! - a scan loop (default every 30s) that re-delivers messages whose
//!   `next_retry_at` has passed
//! - a retention loop (default daily) that sweeps expired and unreadable
//!   records the store's own TTL has not yet removed
//!
//! Both loops are owned by the scheduler: `start` spawns them with a fresh
//! cancellation token, `stop` cancels and joins them. A failed or timed-out
//! pass is logged and the loop keeps going.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rebound_infra::scheduling::{RetryScheduler, RetrySchedulerConfig, SchedulerError};
//!
//! # async fn example(service: Arc<rebound_core::DlqService>) -> Result<(), SchedulerError> {
//! let mut scheduler = RetryScheduler::new(service, RetrySchedulerConfig::default());
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use rebound_common::observability::{ErrorLabels, MetricsCollector, NoOpMetricsCollector};
use rebound_common::ErrorSeverity;
use rebound_core::telemetry::record_store_error;
use rebound_core::DlqService;
use rebound_domain::constants::{
    COMPONENT_RETRY_SCHEDULER, DEFAULT_CLEANUP_INTERVAL, DEFAULT_SCAN_INTERVAL,
    DEFAULT_SCAN_TIMEOUT, METRIC_DLQ_STORE_ERRORS,
};
use rebound_domain::DlqSettings;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

type TaskHandles = Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>;

const SCAN_LOOP: &str = "scan loop";
const RETENTION_LOOP: &str = "retention loop";

/// Configuration for the retry scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedulerConfig {
    /// Time between due-retry scans
    pub scan_interval: Duration,
    /// Time between retention sweeps
    pub cleanup_interval: Duration,
    /// Upper bound for one scan or sweep pass
    pub scan_timeout: Duration,
    /// How long `stop` waits for each loop to exit
    pub join_timeout: Duration,
}

impl Default for RetrySchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&DlqSettings> for RetrySchedulerConfig {
    fn from(settings: &DlqSettings) -> Self {
        Self {
            scan_interval: settings.scan_interval,
            cleanup_interval: settings.cleanup_interval,
            scan_timeout: settings.scan_timeout,
            ..Self::default()
        }
    }
}

/// Periodic scan and retention loops with an explicit lifecycle
pub struct RetryScheduler {
    service: Arc<DlqService>,
    config: RetrySchedulerConfig,
    metrics: Arc<dyn MetricsCollector>,
    cancellation_token: CancellationToken,
    task_handles: TaskHandles,
}

/// What a loop needs besides its timing
#[derive(Clone)]
struct LoopContext {
    service: Arc<DlqService>,
    metrics: Arc<dyn MetricsCollector>,
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl RetryScheduler {
    pub fn new(service: Arc<DlqService>, config: RetrySchedulerConfig) -> Self {
        Self {
            service,
            config,
            metrics: Arc::new(NoOpMetricsCollector),
            cancellation_token: CancellationToken::new(),
            task_handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Count failed and timed-out passes under `dlq_store_errors_total`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &RetrySchedulerConfig {
        &self.config
    }

    /// Spawn the scan and retention loops
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the loops are active
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            cleanup_interval_secs = self.config.cleanup_interval.as_secs(),
            "Starting retry scheduler"
        );

        // Fresh token so the scheduler can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let context =
            LoopContext { service: Arc::clone(&self.service), metrics: Arc::clone(&self.metrics) };
        let scan = tokio::spawn(Self::scan_loop(
            context.clone(),
            self.config.clone(),
            self.cancellation_token.clone(),
        ));
        let retention = tokio::spawn(Self::retention_loop(
            context,
            self.config.clone(),
            self.cancellation_token.clone(),
        ));

        *self.task_handles.lock().await = vec![(SCAN_LOOP, scan), (RETENTION_LOOP, retention)];

        info!("Retry scheduler started");
        Ok(())
    }

    /// Cancel both loops and wait for them to exit
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if nothing is running, or a
    /// timeout/join error if a loop does not exit cleanly
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping retry scheduler");
        self.cancellation_token.cancel();

        let handles = std::mem::take(&mut *self.task_handles.lock().await);
        let join_timeout = self.config.join_timeout;
        for (task, handle) in handles {
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { task, duration: join_timeout })??;
        }

        info!("Retry scheduler stopped");
        Ok(())
    }

    /// True while at least one loop is alive
    pub fn is_running(&self) -> bool {
        self.task_handles
            .try_lock()
            .map(|handles| handles.iter().any(|(_, handle)| !handle.is_finished()))
            .unwrap_or(false)
    }

    async fn scan_loop(
        context: LoopContext,
        config: RetrySchedulerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Scan loop cancelled");
                    break;
                }
                () = tokio::time::sleep(config.scan_interval) => {
                    Self::run_scan(&context, config.scan_timeout).await;
                }
            }
        }
    }

    async fn retention_loop(
        context: LoopContext,
        config: RetrySchedulerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Retention loop cancelled");
                    break;
                }
                () = tokio::time::sleep(config.cleanup_interval) => {
                    Self::run_sweep(&context, config.scan_timeout).await;
                }
            }
        }
    }

    async fn run_scan(context: &LoopContext, timeout: Duration) {
        let started = Instant::now();
        match tokio::time::timeout(timeout, context.service.process_due_retries()).await {
            Ok(Ok(report)) if report.is_idle() => debug!("No DLQ retries due"),
            Ok(Ok(report)) => info!(
                scanned = report.scanned,
                due = report.due,
                republished = report.republished,
                skipped = report.skipped,
                failed = report.failed,
                duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "DLQ retry scan finished"
            ),
            Ok(Err(e)) => {
                error!(error = %e, "DLQ retry scan failed");
                record_store_error(context.metrics.as_ref(), COMPONENT_RETRY_SCHEDULER, &e);
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "DLQ retry scan timed out");
                Self::record_timeout(context.metrics.as_ref());
            }
        }
    }

    async fn run_sweep(context: &LoopContext, timeout: Duration) {
        match tokio::time::timeout(timeout, context.service.sweep_retention()).await {
            Ok(Ok(report)) => {
                debug!(
                    inspected = report.inspected,
                    removed = report.removed,
                    "Retention pass done"
                );
            }
            Ok(Err(e)) => {
                error!(error = %e, "DLQ retention sweep failed");
                record_store_error(context.metrics.as_ref(), COMPONENT_RETRY_SCHEDULER, &e);
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "DLQ retention sweep timed out");
                Self::record_timeout(context.metrics.as_ref());
            }
        }
    }

    fn record_timeout(metrics: &dyn MetricsCollector) {
        let labels = ErrorLabels::new("timeout", COMPONENT_RETRY_SCHEDULER, ErrorSeverity::Warning);
        metrics.increment_counter(METRIC_DLQ_STORE_ERRORS, &labels.as_pairs());
    }
}
