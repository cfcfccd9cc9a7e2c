//! Circuit Breaker Registry
//!
//! One breaker per logical operation name, created lazily on first failure or
//! explicit [`CircuitBreakerRegistry::configure`]. Each entry sits behind its
//! own mutex so callers of different operations never contend.
//!
//! ```text
//!            failures >= threshold
//!   CLOSED ------------------------> OPEN
//!     ^                               |  ^
//!     | 3 consecutive successes       |  | any failure
//!     |                               v  |
//!     +------------------------- HALF_OPEN
//!                  recovery_timeout elapsed (observed by is_open)
//! ```
//!
//! Counters reset on every transition. `is_open` is the only place the
//! Open -> HalfOpen edge is taken, so checking a breaker can advance it.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::constants::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT, HALF_OPEN_SUCCESS_QUOTA,
    METRIC_CIRCUIT_TRANSITIONS,
};
use crate::error::{CommonError, CommonResult};
use crate::observability::{MetricsCollector, NoOpMetricsCollector};
use crate::testing::time::{Clock, SystemClock};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected immediately
    Open,
    /// Trial calls are allowed to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Thresholds for a single breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerOptions {
    /// Failures in the closed state before the circuit opens
    pub failure_threshold: u32,
    /// Minimum time an open circuit stays open
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

impl CircuitBreakerOptions {
    pub fn validate(&self) -> CommonResult<()> {
        if self.failure_threshold == 0 {
            return Err(CommonError::config_field(
                "failure_threshold",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    fn merged(mut self, overrides: CircuitBreakerOverrides) -> Self {
        if let Some(threshold) = overrides.failure_threshold {
            self.failure_threshold = threshold;
        }
        if let Some(timeout) = overrides.recovery_timeout {
            self.recovery_timeout = timeout;
        }
        self
    }
}

/// Partial update applied by [`CircuitBreakerRegistry::configure`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitBreakerOverrides {
    pub failure_threshold: Option<u32>,
    pub recovery_timeout: Option<Duration>,
}

impl CircuitBreakerOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = Some(timeout);
        self
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    pub operation: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Instant>,
    pub options: CircuitBreakerOptions,
}

#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    options: CircuitBreakerOptions,
}

impl BreakerEntry {
    fn new(options: CircuitBreakerOptions) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            options,
        }
    }
}

/// Registry of per-operation circuit breakers
///
/// Construct one per process (or per test) and share it through an `Arc`;
/// there is no global instance.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<Mutex<BreakerEntry>>>,
    defaults: CircuitBreakerOptions,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsCollector>,
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.breakers.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            defaults: CircuitBreakerOptions::default(),
            clock: Arc::new(SystemClock),
            metrics: Arc::new(NoOpMetricsCollector),
        }
    }

    /// Use a custom clock (useful for testing recovery windows)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Options applied to breakers created without explicit configuration
    pub fn with_defaults(mut self, defaults: CircuitBreakerOptions) -> CommonResult<Self> {
        defaults.validate()?;
        self.defaults = defaults;
        Ok(self)
    }

    /// Create the breaker for `operation` if absent, then apply `overrides`
    ///
    /// Invalid merged options are rejected and the breaker is left unchanged.
    pub fn configure(
        &self,
        operation: &str,
        overrides: CircuitBreakerOverrides,
    ) -> CommonResult<()> {
        let entry = self.entry(operation);
        let mut guard = entry.lock();
        let merged = guard.options.merged(overrides);
        merged.validate()?;
        guard.options = merged;
        debug!(
            operation,
            failure_threshold = merged.failure_threshold,
            recovery_timeout_ms =
                u64::try_from(merged.recovery_timeout.as_millis()).unwrap_or(u64::MAX),
            "Circuit breaker configured"
        );
        Ok(())
    }

    /// True while the circuit is open and its recovery window has not passed
    ///
    /// Once the window has passed the breaker moves to half-open and this
    /// returns false, admitting trial calls.
    pub fn is_open(&self, operation: &str) -> bool {
        let Some(entry) = self.existing(operation) else {
            return false;
        };
        let mut guard = entry.lock();
        if guard.state != CircuitState::Open {
            return false;
        }

        let now = self.clock.now();
        let elapsed = guard
            .last_failure_time
            .map_or(guard.options.recovery_timeout, |at| now.saturating_duration_since(at));
        if elapsed < guard.options.recovery_timeout {
            return true;
        }

        self.transition(operation, &mut guard, CircuitState::HalfOpen);
        false
    }

    /// Count a success; only meaningful while half-open
    pub fn record_success(&self, operation: &str) {
        let Some(entry) = self.existing(operation) else {
            return;
        };
        let mut guard = entry.lock();
        if guard.state != CircuitState::HalfOpen {
            return;
        }

        guard.success_count += 1;
        if guard.success_count >= HALF_OPEN_SUCCESS_QUOTA {
            self.transition(operation, &mut guard, CircuitState::Closed);
        }
    }

    /// Count a failure, opening the circuit at the threshold or on any
    /// half-open failure
    pub fn record_failure(&self, operation: &str) {
        let entry = self.entry(operation);
        let mut guard = entry.lock();
        guard.failure_count = guard.failure_count.saturating_add(1);
        guard.last_failure_time = Some(self.clock.now());

        match guard.state {
            CircuitState::Closed if guard.failure_count >= guard.options.failure_threshold => {
                self.transition(operation, &mut guard, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                self.transition(operation, &mut guard, CircuitState::Open);
            }
            _ => {}
        }
    }

    /// Current state; unknown operations report `Closed`
    pub fn state(&self, operation: &str) -> CircuitState {
        self.existing(operation).map_or(CircuitState::Closed, |entry| entry.lock().state)
    }

    pub fn snapshot(&self, operation: &str) -> Option<CircuitBreakerSnapshot> {
        self.existing(operation).map(|entry| Self::snapshot_of(operation, &entry.lock()))
    }

    /// Snapshots of every known breaker, sorted by operation name
    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let entries: Vec<(String, Arc<Mutex<BreakerEntry>>)> = self
            .breakers
            .iter()
            .map(|item| (item.key().clone(), Arc::clone(item.value())))
            .collect();
        let mut snapshots: Vec<_> = entries
            .iter()
            .map(|(name, entry)| Self::snapshot_of(name, &entry.lock()))
            .collect();
        snapshots.sort_by(|a, b| a.operation.cmp(&b.operation));
        snapshots
    }

    /// Force a breaker back to closed with zeroed counters
    ///
    /// Returns false when the operation has no breaker.
    pub fn reset(&self, operation: &str) -> bool {
        let Some(entry) = self.existing(operation) else {
            return false;
        };
        let mut guard = entry.lock();
        if guard.state != CircuitState::Closed {
            self.transition(operation, &mut guard, CircuitState::Closed);
        }
        guard.failure_count = 0;
        guard.success_count = 0;
        guard.last_failure_time = None;
        true
    }

    fn existing(&self, operation: &str) -> Option<Arc<Mutex<BreakerEntry>>> {
        self.breakers.get(operation).map(|entry| Arc::clone(entry.value()))
    }

    fn entry(&self, operation: &str) -> Arc<Mutex<BreakerEntry>> {
        if let Some(existing) = self.existing(operation) {
            return existing;
        }
        let defaults = self.defaults;
        Arc::clone(
            self.breakers
                .entry(operation.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(BreakerEntry::new(defaults))))
                .value(),
        )
    }

    fn transition(&self, operation: &str, entry: &mut BreakerEntry, to: CircuitState) {
        let from = entry.state;
        entry.state = to;
        entry.failure_count = 0;
        entry.success_count = 0;

        match to {
            CircuitState::Open => warn!(operation, %from, %to, "Circuit breaker opened"),
            CircuitState::HalfOpen => {
                info!(operation, %from, %to, "Circuit breaker half-open, allowing trial calls")
            }
            CircuitState::Closed => info!(operation, %from, %to, "Circuit breaker closed"),
        }

        let from_label = from.to_string();
        let to_label = to.to_string();
        self.metrics.increment_counter(
            METRIC_CIRCUIT_TRANSITIONS,
            &[("operation", operation), ("from", &from_label), ("to", &to_label)],
        );
    }

    fn snapshot_of(operation: &str, entry: &BreakerEntry) -> CircuitBreakerSnapshot {
        CircuitBreakerSnapshot {
            operation: operation.to_string(),
            state: entry.state,
            failure_count: entry.failure_count,
            success_count: entry.success_count,
            last_failure_time: entry.last_failure_time,
            options: entry.options,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the circuit breaker registry.
    //!
    //! All timing is driven by `MockClock`; nothing sleeps.

    use super::*;
    use crate::testing::{MockClock, RecordingMetricsCollector};

    fn registry_with_clock() -> (CircuitBreakerRegistry, MockClock) {
        let clock = MockClock::new();
        let registry = CircuitBreakerRegistry::new().with_clock(Arc::new(clock.clone()));
        (registry, clock)
    }

    fn trip(registry: &CircuitBreakerRegistry, operation: &str, failures: u32) {
        for _ in 0..failures {
            registry.record_failure(operation);
        }
    }

    /// Validates that a fresh registry reports closed breakers for unknown
    /// operations and does not create entries for them.
    #[test]
    fn test_unknown_operation_is_closed() {
        let registry = CircuitBreakerRegistry::new();
        assert!(!registry.is_open("fetch"));
        assert_eq!(registry.state("fetch"), CircuitState::Closed);
        assert!(registry.snapshot("fetch").is_none());
        registry.record_success("fetch");
        assert!(registry.snapshots().is_empty());
    }

    /// Validates the trip property: threshold failures open the circuit, the
    /// circuit stays open inside the recovery window and half-opens after it.
    ///
    /// # Test Steps
    /// 1. Configure threshold 3, timeout 10s
    /// 2. Record 3 failures, expect open
    /// 3. Advance 9s, still open
    /// 4. Advance past 10s, `is_open` returns false and state is HalfOpen
    #[test]
    fn test_trip_and_half_open_after_timeout() {
        let (registry, clock) = registry_with_clock();
        registry
            .configure(
                "ai_api",
                CircuitBreakerOverrides::new()
                    .failure_threshold(3)
                    .recovery_timeout(Duration::from_secs(10)),
            )
            .unwrap();

        trip(&registry, "ai_api", 2);
        assert!(!registry.is_open("ai_api"));
        registry.record_failure("ai_api");
        assert!(registry.is_open("ai_api"));

        clock.advance(Duration::from_secs(9));
        assert!(registry.is_open("ai_api"));

        clock.advance(Duration::from_secs(1));
        assert!(!registry.is_open("ai_api"));
        assert_eq!(registry.state("ai_api"), CircuitState::HalfOpen);
    }

    /// Validates recovery: three half-open successes close the circuit with
    /// zeroed counters.
    #[test]
    fn test_half_open_successes_close_circuit() {
        let (registry, clock) = registry_with_clock();
        registry
            .configure("db", CircuitBreakerOverrides::new().failure_threshold(1))
            .unwrap();
        registry.record_failure("db");
        clock.advance(DEFAULT_RECOVERY_TIMEOUT);
        assert!(!registry.is_open("db"));

        registry.record_success("db");
        registry.record_success("db");
        assert_eq!(registry.state("db"), CircuitState::HalfOpen);
        assert_eq!(registry.snapshot("db").unwrap().success_count, 2);

        registry.record_success("db");
        let snapshot = registry.snapshot("db").unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
    }

    /// Validates that one half-open failure reopens the circuit regardless of
    /// earlier trial successes.
    #[test]
    fn test_half_open_failure_reopens() {
        let (registry, clock) = registry_with_clock();
        registry
            .configure("db", CircuitBreakerOverrides::new().failure_threshold(1))
            .unwrap();
        registry.record_failure("db");
        clock.advance(DEFAULT_RECOVERY_TIMEOUT);
        assert!(!registry.is_open("db"));

        registry.record_success("db");
        registry.record_success("db");
        registry.record_failure("db");

        let snapshot = registry.snapshot("db").unwrap();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.success_count, 0);
        assert!(registry.is_open("db"));
    }

    #[test]
    fn test_success_in_closed_state_is_noop() {
        let registry = CircuitBreakerRegistry::new();
        trip(&registry, "svc", 4);
        registry.record_success("svc");

        let snapshot = registry.snapshot("svc").unwrap();
        assert_eq!(snapshot.failure_count, 4);
        assert_eq!(snapshot.success_count, 0);

        registry.record_failure("svc");
        assert!(registry.is_open("svc"));
    }

    #[test]
    fn test_default_options() {
        let registry = CircuitBreakerRegistry::new();
        registry.configure("svc", CircuitBreakerOverrides::default()).unwrap();
        let options = registry.snapshot("svc").unwrap().options;
        assert_eq!(options.failure_threshold, 5);
        assert_eq!(options.recovery_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let registry = CircuitBreakerRegistry::new();
        let err = registry
            .configure("svc", CircuitBreakerOverrides::new().failure_threshold(0))
            .unwrap_err();
        assert!(matches!(err, CommonError::Config { .. }));
        assert_eq!(registry.snapshot("svc").unwrap().options.failure_threshold, 5);
    }

    #[test]
    fn test_breakers_are_independent() {
        let registry = CircuitBreakerRegistry::new();
        trip(&registry, "a", 5);
        assert!(registry.is_open("a"));
        assert!(!registry.is_open("b"));
    }

    #[test]
    fn test_reset_and_snapshots() {
        let registry = CircuitBreakerRegistry::new();
        trip(&registry, "zeta", 5);
        trip(&registry, "alpha", 1);

        let names: Vec<_> = registry.snapshots().into_iter().map(|s| s.operation).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);

        assert!(registry.reset("zeta"));
        assert_eq!(registry.state("zeta"), CircuitState::Closed);
        assert!(!registry.reset("missing"));
    }

    #[test]
    fn test_transitions_are_counted() {
        let clock = MockClock::new();
        let metrics = RecordingMetricsCollector::new();
        let registry = CircuitBreakerRegistry::new()
            .with_clock(Arc::new(clock.clone()))
            .with_metrics(Arc::new(metrics.clone()));
        registry.configure("svc", CircuitBreakerOverrides::new().failure_threshold(1)).unwrap();

        registry.record_failure("svc");
        clock.advance(DEFAULT_RECOVERY_TIMEOUT);
        registry.is_open("svc");

        assert_eq!(metrics.counter_total(METRIC_CIRCUIT_TRANSITIONS), 2);
        assert_eq!(metrics.counter_with_label(METRIC_CIRCUIT_TRANSITIONS, "to", "OPEN"), 1);
        assert_eq!(metrics.counter_with_label(METRIC_CIRCUIT_TRANSITIONS, "to", "HALF_OPEN"), 1);
    }

    #[test]
    fn test_concurrent_failures_trip_once() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        registry.record_failure("shared");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.state("shared"), CircuitState::Open);
    }
}
