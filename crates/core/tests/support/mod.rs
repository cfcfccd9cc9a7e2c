//! Shared test helpers for `rebound-core` integration tests.
//!
//! In-memory fakes for the DLQ ports. The key-value fake honours TTLs
//! against a [`MockClock`] and can be told to fail, so tests can check how
//! the service behaves when its infrastructure misbehaves.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rebound_common::resilience::BackoffCalculator;
use rebound_common::testing::{Clock, MockClock, RecordingMetricsCollector};
use rebound_core::{DlqService, EventPublisher, KeyValueStore, MessagePublisher};
use rebound_domain::{DlqConfig, DlqEvent, ReboundError, Result};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(Vec<String>),
}

/// Glob match supporting `*` only
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = match key.strip_prefix(parts[0]) {
        Some(rest) => rest,
        None => return false,
    };
    for (i, part) in parts.iter().enumerate().skip(1) {
        if i == parts.len() - 1 {
            return rest.ends_with(part);
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

/// In-memory [`KeyValueStore`] with TTLs driven by a [`MockClock`]
#[derive(Debug, Clone)]
pub struct FakeKv {
    clock: MockClock,
    entries: Arc<Mutex<HashMap<String, (Value, Instant)>>>,
    fail_writes: Arc<AtomicBool>,
    fail_prefix: Arc<Mutex<Option<String>>>,
}

impl FakeKv {
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            entries: Arc::new(Mutex::new(HashMap::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_prefix: Arc::new(Mutex::new(None)),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail only writes to keys starting with `prefix`; `None` clears it
    pub fn fail_writes_under(&self, prefix: Option<&str>) {
        *self.fail_prefix.lock() = prefix.map(str::to_string);
    }

    /// Raw insert, bypassing failure injection
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        let expires = self.clock.now() + ttl;
        self.entries.lock().insert(key.to_string(), (Value::Text(value.to_string()), expires));
    }

    pub fn live_keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, (_, expires))| *expires > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        let under_prefix =
            self.fail_prefix.lock().as_deref().is_some_and(|prefix| key.starts_with(prefix));
        if under_prefix || self.fail_writes.load(Ordering::SeqCst) {
            return Err(ReboundError::Store("injected write failure".into()));
        }
        Ok(())
    }

    fn live(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if matches!(entries.get(key), Some((_, expires)) if *expires <= now) {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl KeyValueStore for FakeKv {
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.check_writable(key)?;
        let expires = self.clock.now() + ttl;
        self.entries.lock().insert(key.to_string(), (Value::Text(value), expires));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> Result<bool> {
        self.check_writable(key)?;
        if self.live(key).is_some() {
            return Ok(false);
        }
        let expires = self.clock.now() + ttl;
        self.entries.lock().insert(key.to_string(), (Value::Text(value), expires));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.live(key) {
            Some(Value::Text(text)) => Ok(Some(text)),
            Some(Value::List(_)) => Err(ReboundError::Store(format!("{key} holds a list"))),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_writable(key)?;
        let existed = self.live(key).is_some();
        self.entries.lock().remove(key);
        Ok(existed)
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.live_keys().into_iter().filter(|k| glob_match(pattern, k)).collect())
    }

    async fn list_push(&self, key: &str, value: String, ttl: Duration) -> Result<usize> {
        self.check_writable(key)?;
        let mut list = match self.live(key) {
            Some(Value::List(list)) => list,
            Some(Value::Text(_)) => {
                return Err(ReboundError::Store(format!("{key} holds a value")));
            }
            None => Vec::new(),
        };
        list.push(value);
        let len = list.len();
        let expires = self.clock.now() + ttl;
        self.entries.lock().insert(key.to_string(), (Value::List(list), expires));
        Ok(len)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        match self.live(key) {
            Some(Value::List(list)) => Ok(list),
            Some(Value::Text(_)) => Err(ReboundError::Store(format!("{key} holds a value"))),
            None => Ok(Vec::new()),
        }
    }
}

/// Broker fake that records every publish
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    failures_left: Arc<Mutex<u32>>,
}

impl RecordingPublisher {
    /// Fail the next `count` publishes with a transient-looking error
    pub fn fail_next(&self, count: u32) {
        *self.failures_left.lock() = count;
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }

    pub fn published_to(&self, queue: &str) -> Vec<Vec<u8>> {
        self.published().into_iter().filter(|(q, _)| q == queue).map(|(_, p)| p).collect()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(ReboundError::Publish("connection reset by broker".into()));
            }
        }
        self.published.lock().push((queue.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Event bus fake that records every event
#[derive(Debug, Clone, Default)]
pub struct RecordingEvents {
    events: Arc<Mutex<Vec<DlqEvent>>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<DlqEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(&self, event: DlqEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Service plus handles to every fake behind it
pub struct Harness {
    pub clock: MockClock,
    pub kv: FakeKv,
    pub publisher: RecordingPublisher,
    pub events: RecordingEvents,
    pub metrics: RecordingMetricsCollector,
    pub service: DlqService,
}

/// Jitter off, 10s base delay, otherwise default policy
pub fn test_defaults() -> DlqConfig {
    DlqConfig {
        base_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(600),
        enable_jitter: false,
        ..DlqConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_defaults())
}

pub fn harness_with(defaults: DlqConfig) -> Harness {
    let clock = MockClock::new();
    let kv = FakeKv::new(clock.clone());
    let publisher = RecordingPublisher::default();
    let events = RecordingEvents::default();
    let metrics = RecordingMetricsCollector::new();
    let service = DlqService::new(
        Arc::new(kv.clone()),
        Arc::new(publisher.clone()),
        Arc::new(events.clone()),
    )
    .with_defaults(defaults)
    .with_clock(Arc::new(clock.clone()))
    .with_metrics(Arc::new(metrics.clone()))
    .with_backoff(Arc::new(BackoffCalculator::seeded(42)));

    Harness { clock, kv, publisher, events, metrics, service }
}
