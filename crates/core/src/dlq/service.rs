//! DLQ orchestrator
//!
//! [`DlqService`] is what worker code calls once the retry executor has
//! given up on a message. It decides between scheduling another delivery and
//! parking the message in the permanent partition, and it runs the scan and
//! retention passes driven by the scheduler in `rebound-infra`.
//!
//! Admission, manual retry and delete never return errors: callers are
//! usually already handling a failure. Store and event-bus problems are
//! logged and counted, the business error is always recorded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rebound_common::observability::{MetricsCollector, NoOpMetricsCollector};
use rebound_common::resilience::{BackoffCalculator, RetryExecutor, RetryPolicy};
use rebound_common::testing::{Clock, SystemClock};
use rebound_domain::constants::{
    COMPONENT_DEAD_LETTER_STORE, COMPONENT_DLQ_SERVICE, DEFAULT_CLAIM_TTL, METRIC_DLQ_ADDED,
    METRIC_DLQ_PERMANENT, METRIC_DLQ_RETRIES, METRIC_DLQ_SCAN_DURATION_MS,
};
use rebound_domain::{
    validate_queue_name, AdmitOutcome, DlqConfig, DlqConfigOverrides, DlqEvent, DlqSettings,
    DlqStats, FailedMessage, FailureReport, Partition, QueueStats, ReboundError, Result,
    RetryPointer, ScanReport, SweepReport,
};
use tracing::{debug, info, instrument, warn};

use super::alerts::AlertLatch;
use super::config::{backoff_policy, QueueConfigRegistry};
use super::ports::{EventPublisher, KeyValueStore, MessagePublisher};
use super::store::{DeadLetterStore, HistoryEntry};
use crate::telemetry::record_store_error;

/// Circuit breaker operation name used for re-publishing onto `queue`
pub fn republish_operation(queue: &str) -> String {
    format!("dlq_republish:{queue}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Scheduler,
    Manual,
}

impl Trigger {
    const fn as_label(self) -> &'static str {
        match self {
            Self::Scheduler => "scheduler",
            Self::Manual => "manual",
        }
    }
}

enum PointerOutcome {
    Republished,
    Skipped,
}

/// Dead-letter queue service
pub struct DlqService {
    store: DeadLetterStore,
    publisher: Arc<dyn MessagePublisher>,
    events: Arc<dyn EventPublisher>,
    configs: QueueConfigRegistry,
    alerts: AlertLatch,
    backoff: Arc<BackoffCalculator>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsCollector>,
    delivery: Option<(Arc<RetryExecutor>, RetryPolicy)>,
    claim_ttl: Duration,
}

impl std::fmt::Debug for DlqService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DlqService")
            .field("configs", &self.configs)
            .field("claim_ttl", &self.claim_ttl)
            .finish_non_exhaustive()
    }
}

impl DlqService {
    /// Create a service with default policy, system clock and no metrics
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        publisher: Arc<dyn MessagePublisher>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store: DeadLetterStore::new(kv),
            publisher,
            events,
            configs: QueueConfigRegistry::default(),
            alerts: AlertLatch::new(),
            backoff: Arc::new(BackoffCalculator::new()),
            clock: Arc::new(SystemClock),
            metrics: Arc::new(NoOpMetricsCollector),
            delivery: None,
            claim_ttl: DEFAULT_CLAIM_TTL,
        }
    }

    /// Apply defaults, per-queue overrides and the claim TTL from settings
    pub fn with_settings(mut self, settings: &DlqSettings) -> Self {
        self.configs = QueueConfigRegistry::from_settings(settings);
        self.claim_ttl = settings.claim_ttl;
        self
    }

    pub fn with_defaults(mut self, defaults: DlqConfig) -> Self {
        self.configs = QueueConfigRegistry::new(defaults);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Jitter source for `next_retry_at` (seed it in tests)
    pub fn with_backoff(mut self, backoff: Arc<BackoffCalculator>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Route re-publication through a retry executor
    ///
    /// Each origin queue gets its own circuit (see [`republish_operation`]).
    pub fn with_delivery_retry(
        mut self,
        executor: Arc<RetryExecutor>,
        policy: RetryPolicy,
    ) -> Self {
        self.delivery = Some((executor, policy));
        self
    }

    pub fn with_claim_ttl(mut self, ttl: Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }

    pub fn store(&self) -> &DeadLetterStore {
        &self.store
    }

    /// Effective policy for `queue`
    pub fn queue_config(&self, queue: &str) -> DlqConfig {
        self.configs.get(queue)
    }

    /// Register overrides for `queue`; returns the effective policy
    pub fn configure_queue(
        &self,
        queue: &str,
        overrides: &DlqConfigOverrides,
    ) -> Result<DlqConfig> {
        self.configs.configure(queue, overrides)
    }

    /// Hand a failed message to the DLQ
    ///
    /// `current_retry_count` is how many deliveries the caller already
    /// attempted. Below the queue's `max_retries` the message is scheduled
    /// with backoff, otherwise it goes straight to the permanent partition.
    /// A `dlq.message.added` event is emitted either way.
    #[instrument(skip(self, payload, report, overrides), fields(retry_count = current_retry_count))]
    pub async fn admit_failure(
        &self,
        queue: &str,
        payload: Vec<u8>,
        report: FailureReport,
        current_retry_count: u32,
        overrides: Option<&DlqConfigOverrides>,
    ) -> AdmitOutcome {
        let config = self.configs.resolve(queue, overrides).unwrap_or_else(|err| {
            warn!(%queue, error = %err, "Ignoring invalid call-site DLQ overrides");
            self.configs.get(queue)
        });
        let now = self.clock.utc_now();
        let mut message = FailedMessage::new(
            queue,
            payload,
            report,
            current_retry_count,
            config.max_retries,
            now,
        );

        let outcome = if let Err(err) = validate_queue_name(queue) {
            warn!(%queue, error = %err, "Refusing DLQ admission");
            AdmitOutcome::Dropped { message_id: message.id.clone(), reason: err.to_string() }
        } else if message.has_retries_remaining() {
            self.admit_scheduled(&mut message, &config, now).await
        } else {
            self.admit_permanent(&message, &config, now).await
        };

        let partition = match &outcome {
            AdmitOutcome::Scheduled { .. } => Some(Partition::Active),
            AdmitOutcome::Permanent { .. } => Some(Partition::Permanent),
            AdmitOutcome::Dropped { .. } => None,
        };
        if let Some(partition) = partition {
            self.metrics.increment_counter(
                METRIC_DLQ_ADDED,
                &[("queue", queue), ("partition", partition.as_str())],
            );
            self.append_history(&message, partition, config.retention_period, now).await;
        }

        self.emit(DlqEvent::MessageAdded {
            queue: queue.to_string(),
            message_id: message.id.clone(),
            error: message.error.clone(),
            retry_count: message.retry_count,
            at: now,
        })
        .await;

        outcome
    }

    async fn admit_scheduled(
        &self,
        message: &mut FailedMessage,
        config: &DlqConfig,
        now: DateTime<Utc>,
    ) -> AdmitOutcome {
        let delay = self.next_delay(message.retry_count, config);
        let next_retry_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|offset| now.checked_add_signed(offset))
            .unwrap_or(now);
        message.next_retry_at = Some(next_retry_at);

        if let Err(err) = self.store.put(message, config.retention_period).await {
            return self.dropped(message, &err);
        }
        let pointer = RetryPointer {
            queue: message.queue.clone(),
            message_id: message.id.clone(),
            next_retry_at,
        };
        if let Err(err) = self.store.schedule(&pointer, config.retention_period).await {
            // Without a pointer the record would never be retried
            if let Err(cleanup) =
                self.store.delete_in(Partition::Active, &message.queue, &message.id).await
            {
                self.swallow(COMPONENT_DEAD_LETTER_STORE, "discard_unscheduled", &cleanup);
            }
            return self.dropped(message, &err);
        }

        debug!(
            queue = %message.queue,
            message_id = %message.id,
            retry_count = message.retry_count,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduled DLQ retry"
        );
        AdmitOutcome::Scheduled { message_id: message.id.clone(), next_retry_at }
    }

    async fn admit_permanent(
        &self,
        message: &FailedMessage,
        config: &DlqConfig,
        now: DateTime<Utc>,
    ) -> AdmitOutcome {
        if let Err(err) = self.store.move_permanent(message, config.retention_period).await {
            return self.dropped(message, &err);
        }

        warn!(
            queue = %message.queue,
            message_id = %message.id,
            retry_count = message.retry_count,
            error = %message.error,
            "Message permanently failed"
        );
        self.metrics.increment_counter(METRIC_DLQ_PERMANENT, &[("queue", message.queue.as_str())]);
        self.emit(DlqEvent::MessagePermanent {
            queue: message.queue.clone(),
            message_id: message.id.clone(),
            error: message.error.clone(),
            retry_count: message.retry_count,
            at: now,
        })
        .await;
        self.check_threshold(&message.queue, config.alert_threshold, now).await;

        AdmitOutcome::Permanent { message_id: message.id.clone() }
    }

    /// Fire `dlq.threshold.exceeded` when the permanent count first reaches
    /// the threshold; see [`AlertLatch`] for re-arming.
    async fn check_threshold(&self, queue: &str, threshold: u32, now: DateTime<Utc>) {
        let count = match self.store.count(Partition::Permanent, Some(queue)).await {
            Ok(count) => count as u64,
            Err(err) => {
                self.swallow(COMPONENT_DEAD_LETTER_STORE, "count_permanent", &err);
                return;
            }
        };
        if self.alerts.observe(queue, count, threshold) {
            warn!(%queue, permanent_count = count, threshold, "DLQ alert threshold exceeded");
            self.emit(DlqEvent::ThresholdExceeded {
                queue: queue.to_string(),
                permanent_count: count,
                threshold,
                at: now,
            })
            .await;
        }
    }

    /// Re-publish a stored message now, whatever partition holds it
    ///
    /// Returns false when no record exists, another process holds the
    /// message's claim, or publishing failed. `retry_count` moves forward;
    /// a permanent record stays permanent.
    #[instrument(skip(self))]
    pub async fn retry_message(&self, queue: &str, message_id: &str) -> bool {
        let (partition, message) = match self.store.find(queue, message_id).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!(%queue, %message_id, "Manual retry for unknown message");
                return false;
            }
            Err(err) => {
                self.swallow(COMPONENT_DEAD_LETTER_STORE, "find", &err);
                return false;
            }
        };

        match self.store.claim(queue, message_id, self.claim_ttl).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%queue, %message_id, "Message is claimed elsewhere, skipping manual retry");
                return false;
            }
            Err(err) => {
                self.swallow(COMPONENT_DEAD_LETTER_STORE, "claim", &err);
                return false;
            }
        }

        let result = self.redeliver(partition, message, Trigger::Manual).await;
        self.release(queue, message_id).await;

        match result {
            Ok(message) => {
                info!(
                    %queue,
                    %message_id,
                    retry_count = message.retry_count,
                    "Manually retried DLQ message"
                );
                self.emit(DlqEvent::ManualRetry {
                    queue: queue.to_string(),
                    message_id: message_id.to_string(),
                    retry_count: message.retry_count,
                    at: self.clock.utc_now(),
                })
                .await;
                true
            }
            Err(err) => {
                self.swallow(COMPONENT_DLQ_SERVICE, "manual_retry", &err);
                false
            }
        }
    }

    /// Hard delete from whichever partition holds the message
    #[instrument(skip(self))]
    pub async fn delete_message(&self, queue: &str, message_id: &str) -> bool {
        match self.store.delete(queue, message_id).await {
            Ok(true) => {
                info!(%queue, %message_id, "Deleted DLQ message");
                self.emit(DlqEvent::MessageDeleted {
                    queue: queue.to_string(),
                    message_id: message_id.to_string(),
                    at: self.clock.utc_now(),
                })
                .await;
                self.rearm_alert(queue).await;
                true
            }
            Ok(false) => false,
            Err(err) => {
                self.swallow(COMPONENT_DEAD_LETTER_STORE, "delete", &err);
                false
            }
        }
    }

    /// Aggregate counts, optionally scoped to one queue. O(total keys).
    pub async fn get_stats(&self, queue: Option<&str>) -> Result<DlqStats> {
        let active = self.store.message_ids(Partition::Active, queue).await?;
        let permanent = self.store.message_ids(Partition::Permanent, queue).await?;
        let scheduled = self.store.scheduled_ids(queue).await?;

        let mut by_queue: BTreeMap<String, QueueStats> = BTreeMap::new();
        if let Some(queue) = queue {
            by_queue.insert(queue.to_string(), QueueStats::default());
        }
        for (name, _) in &active {
            by_queue.entry(name.clone()).or_default().total += 1;
        }
        for (name, _) in &permanent {
            let entry = by_queue.entry(name.clone()).or_default();
            entry.total += 1;
            entry.permanent += 1;
        }
        for (name, _) in &scheduled {
            by_queue.entry(name.clone()).or_default().retry_scheduled += 1;
        }

        for (name, counts) in &by_queue {
            self.alerts.rearm_below(name, counts.permanent, self.configs.get(name).alert_threshold);
        }

        Ok(DlqStats {
            total: (active.len() + permanent.len()) as u64,
            permanent: permanent.len() as u64,
            retry_scheduled: scheduled.len() as u64,
            by_queue,
        })
    }

    /// Stored records of one partition of `queue`, oldest first
    pub async fn list_messages(
        &self,
        queue: &str,
        partition: Partition,
    ) -> Result<Vec<FailedMessage>> {
        self.store.list(partition, Some(queue)).await
    }

    /// Admission history of `queue`, oldest first
    pub async fn history(&self, queue: &str) -> Result<Vec<HistoryEntry>> {
        self.store.history(queue).await
    }

    /// Delete every record and pointer of `queue`; returns records removed
    #[instrument(skip(self))]
    pub async fn purge_queue(&self, queue: &str) -> Result<usize> {
        let mut ids = self.store.message_ids(Partition::Active, Some(queue)).await?;
        ids.extend(self.store.message_ids(Partition::Permanent, Some(queue)).await?);
        ids.sort();
        ids.dedup();

        let mut removed = 0;
        for (name, id) in &ids {
            if self.store.delete(name, id).await? {
                removed += 1;
                self.emit(DlqEvent::MessageDeleted {
                    queue: name.clone(),
                    message_id: id.clone(),
                    at: self.clock.utc_now(),
                })
                .await;
            }
        }
        for (name, id) in self.store.scheduled_ids(Some(queue)).await? {
            self.store.unschedule(&name, &id).await?;
        }

        self.alerts.rearm_below(queue, 0, self.configs.get(queue).alert_threshold);
        info!(%queue, removed, "Purged DLQ queue");
        Ok(removed)
    }

    /// One scheduler scan: re-publish every due message to its origin queue
    ///
    /// Pointers are handled one at a time; a failing pointer is logged,
    /// counted in the report and left in place for the next scan.
    pub async fn process_due_retries(&self) -> Result<ScanReport> {
        let started = self.clock.now();
        let now = self.clock.utc_now();
        let pointers = self.store.pointers(None).await.map_err(|err| {
            self.swallow(COMPONENT_DEAD_LETTER_STORE, "list_pointers", &err);
            err
        })?;

        let mut report = ScanReport { scanned: pointers.len(), ..ScanReport::default() };
        for pointer in pointers.iter().filter(|p| p.is_due(now)) {
            report.due += 1;
            match self.process_pointer(pointer).await {
                Ok(PointerOutcome::Republished) => report.republished += 1,
                Ok(PointerOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        queue = %pointer.queue,
                        message_id = %pointer.message_id,
                        error = %err,
                        "Failed to process due DLQ retry"
                    );
                    record_store_error(self.metrics.as_ref(), COMPONENT_DLQ_SERVICE, &err);
                }
            }
        }

        let elapsed = self.clock.now().saturating_duration_since(started);
        self.metrics.record_timing(
            METRIC_DLQ_SCAN_DURATION_MS,
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            &[],
        );
        if report.is_idle() {
            debug!(scanned = report.scanned, "DLQ scan found nothing due");
        } else {
            info!(
                scanned = report.scanned,
                due = report.due,
                republished = report.republished,
                skipped = report.skipped,
                failed = report.failed,
                "DLQ scan complete"
            );
        }
        Ok(report)
    }

    async fn process_pointer(&self, pointer: &RetryPointer) -> Result<PointerOutcome> {
        if !self.store.claim(&pointer.queue, &pointer.message_id, self.claim_ttl).await? {
            debug!(
                queue = %pointer.queue,
                message_id = %pointer.message_id,
                "Pointer claimed elsewhere"
            );
            return Ok(PointerOutcome::Skipped);
        }
        let outcome = self.process_claimed(pointer).await;
        self.release(&pointer.queue, &pointer.message_id).await;
        outcome
    }

    async fn process_claimed(&self, pointer: &RetryPointer) -> Result<PointerOutcome> {
        // The scan works from a snapshot; a manual retry may have consumed
        // or replaced this pointer before the claim was taken.
        let current = self.store.pointer(&pointer.queue, &pointer.message_id).await?;
        if !current.is_some_and(|p| p.is_due(self.clock.utc_now())) {
            debug!(
                queue = %pointer.queue,
                message_id = %pointer.message_id,
                "Retry pointer no longer due"
            );
            return Ok(PointerOutcome::Skipped);
        }

        let Some(message) = self.store.get(&pointer.queue, &pointer.message_id).await? else {
            debug!(
                queue = %pointer.queue,
                message_id = %pointer.message_id,
                "Dropping stale retry pointer"
            );
            self.store.unschedule(&pointer.queue, &pointer.message_id).await?;
            return Ok(PointerOutcome::Skipped);
        };

        let message = self.redeliver(Partition::Active, message, Trigger::Scheduler).await?;
        self.emit(DlqEvent::RetrySuccessful {
            queue: message.queue.clone(),
            message_id: message.id.clone(),
            retry_count: message.retry_count,
            at: self.clock.utc_now(),
        })
        .await;
        Ok(PointerOutcome::Republished)
    }

    /// Publish, then move `retry_count` forward and re-persist
    ///
    /// Only a publish failure is returned; once the payload is out, store
    /// failures are swallowed.
    async fn redeliver(
        &self,
        partition: Partition,
        mut message: FailedMessage,
        trigger: Trigger,
    ) -> Result<FailedMessage> {
        self.deliver(&message.queue, &message.payload).await?;

        message.retry_count = message.retry_count.saturating_add(1);
        message.next_retry_at = None;
        let ttl = self.remaining_retention(&message);
        if let Err(err) = self.store.put_in(partition, &message, ttl).await {
            self.swallow(COMPONENT_DEAD_LETTER_STORE, "persist_retry", &err);
        }
        if partition == Partition::Active {
            if let Err(err) = self.store.unschedule(&message.queue, &message.id).await {
                self.swallow(COMPONENT_DEAD_LETTER_STORE, "unschedule", &err);
            }
        }

        self.metrics.increment_counter(
            METRIC_DLQ_RETRIES,
            &[("queue", message.queue.as_str()), ("trigger", trigger.as_label())],
        );
        debug!(
            queue = %message.queue,
            message_id = %message.id,
            retry_count = message.retry_count,
            trigger = trigger.as_label(),
            "Re-published DLQ message"
        );
        Ok(message)
    }

    async fn deliver(&self, queue: &str, payload: &[u8]) -> Result<()> {
        match &self.delivery {
            Some((executor, policy)) => executor
                .execute_with_retry(&republish_operation(queue), policy, || {
                    self.publisher.publish(queue, payload)
                })
                .await
                .map_err(|err| ReboundError::Publish(err.to_string())),
            None => self.publisher.publish(queue, payload).await,
        }
    }

    /// Best-effort retention audit; the store's TTL is the primary expiry
    ///
    /// Removes records older than their queue's retention period, records
    /// that no longer decode and pointers whose record is gone.
    pub async fn sweep_retention(&self) -> Result<SweepReport> {
        let now = self.clock.utc_now();
        let mut report = SweepReport::default();
        let mut queues = Vec::new();

        for partition in Partition::ALL {
            for (queue, id) in self.store.message_ids(partition, None).await? {
                report.inspected += 1;
                let expired = match self.store.get_in(partition, &queue, &id).await {
                    Ok(Some(message)) => self.is_expired(&message, now),
                    Ok(None) => false,
                    Err(ReboundError::Serialization(reason)) => {
                        warn!(%queue, message_id = %id, %reason, "Removing undecodable DLQ record");
                        true
                    }
                    Err(err) => {
                        self.swallow(COMPONENT_DEAD_LETTER_STORE, "sweep_read", &err);
                        false
                    }
                };
                if expired && self.store.delete(&queue, &id).await? {
                    report.removed += 1;
                }
                queues.push(queue);
            }
        }

        for (queue, id) in self.store.scheduled_ids(None).await? {
            report.inspected += 1;
            if self.store.get(&queue, &id).await.ok().flatten().is_none()
                && self.store.unschedule(&queue, &id).await?
            {
                report.removed += 1;
            }
        }

        queues.sort();
        queues.dedup();
        for queue in &queues {
            self.rearm_alert(queue).await;
        }

        info!(
            inspected = report.inspected,
            removed = report.removed,
            "DLQ retention sweep complete"
        );
        Ok(report)
    }

    fn is_expired(&self, message: &FailedMessage, now: DateTime<Utc>) -> bool {
        let retention = self.configs.get(&message.queue).retention_period;
        let age = (now - message.failed_at).to_std().unwrap_or_default();
        age >= retention
    }

    fn remaining_retention(&self, message: &FailedMessage) -> Duration {
        let retention = self.configs.get(&message.queue).retention_period;
        let age = (self.clock.utc_now() - message.failed_at).to_std().unwrap_or_default();
        retention.saturating_sub(age).max(Duration::from_secs(1))
    }

    fn next_delay(&self, attempt: u32, config: &DlqConfig) -> Duration {
        match backoff_policy(config) {
            Ok(policy) => self.backoff.delay(attempt, &policy),
            Err(err) => {
                warn!(error = %err, "Falling back to base delay");
                config.base_delay
            }
        }
    }

    async fn rearm_alert(&self, queue: &str) {
        match self.store.count(Partition::Permanent, Some(queue)).await {
            Ok(count) => {
                let threshold = self.configs.get(queue).alert_threshold;
                self.alerts.rearm_below(queue, count as u64, threshold);
            }
            Err(err) => self.swallow(COMPONENT_DEAD_LETTER_STORE, "count_permanent", &err),
        }
    }

    async fn release(&self, queue: &str, message_id: &str) {
        if let Err(err) = self.store.release(queue, message_id).await {
            self.swallow(COMPONENT_DEAD_LETTER_STORE, "release_claim", &err);
        }
    }

    async fn append_history(
        &self,
        message: &FailedMessage,
        partition: Partition,
        ttl: Duration,
        at: DateTime<Utc>,
    ) {
        let entry = HistoryEntry {
            message_id: message.id.clone(),
            partition,
            retry_count: message.retry_count,
            error: message.error.clone(),
            at,
        };
        if let Err(err) = self.store.append_history(&message.queue, &entry, ttl).await {
            self.swallow(COMPONENT_DEAD_LETTER_STORE, "append_history", &err);
        }
    }

    async fn emit(&self, event: DlqEvent) {
        let name = event.name();
        if let Err(err) = self.events.publish(event).await {
            warn!(event = name, error = %err, "Failed to publish DLQ event");
            record_store_error(self.metrics.as_ref(), COMPONENT_DLQ_SERVICE, &err);
        }
    }

    fn dropped(&self, message: &FailedMessage, err: &ReboundError) -> AdmitOutcome {
        self.swallow(COMPONENT_DEAD_LETTER_STORE, "admit", err);
        AdmitOutcome::Dropped { message_id: message.id.clone(), reason: err.to_string() }
    }

    fn swallow(&self, component: &'static str, operation: &str, err: &ReboundError) {
        warn!(component, operation, error = %err, "DLQ store operation failed");
        record_store_error(self.metrics.as_ref(), component, err);
    }
}
