//! Domain constants
//!
//! Defaults, key layout, event names and metric names shared by the DLQ
//! service, the scheduler and the adapters.

use std::time::Duration;

// DLQ policy defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_ENABLE_JITTER: bool = true;
pub const DEFAULT_RETENTION_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_ALERT_THRESHOLD: u32 = 100;

// Upper bounds accepted by validation
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const MAX_RETENTION_PERIOD: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

// Background loop defaults
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

// Key layout: {prefix}:{queue}:{message_id}; history is {prefix}:{queue}
pub const KEY_PREFIX_ACTIVE: &str = "dlq:active";
pub const KEY_PREFIX_PERMANENT: &str = "dlq:permanent";
pub const KEY_PREFIX_SCHEDULE: &str = "dlq:schedule";
pub const KEY_PREFIX_CLAIM: &str = "dlq:claim";
pub const KEY_PREFIX_HISTORY: &str = "dlq:history";

// Event names published on the alerting bus
pub const EVENT_MESSAGE_ADDED: &str = "dlq.message.added";
pub const EVENT_RETRY_SUCCESSFUL: &str = "dlq.retry.successful";
pub const EVENT_MESSAGE_PERMANENT: &str = "dlq.message.permanent";
pub const EVENT_THRESHOLD_EXCEEDED: &str = "dlq.threshold.exceeded";
pub const EVENT_MANUAL_RETRY: &str = "dlq.message.manual_retry";
pub const EVENT_MESSAGE_DELETED: &str = "dlq.message.deleted";

// Metric names
pub const METRIC_DLQ_ADDED: &str = "dlq_messages_added_total";
pub const METRIC_DLQ_PERMANENT: &str = "dlq_messages_permanent_total";
pub const METRIC_DLQ_RETRIES: &str = "dlq_retries_total";
pub const METRIC_DLQ_STORE_ERRORS: &str = "dlq_store_errors_total";
pub const METRIC_DLQ_SCAN_DURATION_MS: &str = "dlq_scan_duration_ms";

// Component labels
pub const COMPONENT_DEAD_LETTER_STORE: &str = "dead_letter_store";
pub const COMPONENT_DLQ_SERVICE: &str = "dlq_service";
pub const COMPONENT_RETRY_SCHEDULER: &str = "retry_scheduler";
