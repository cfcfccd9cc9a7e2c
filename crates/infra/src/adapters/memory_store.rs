//! In-memory key-value store with per-key TTLs
//!
//! Backs the dead letter store in tests, single-process deployments and
//! local development. Expiry is lazy: reads skip and remove expired entries,
//! and [`InMemoryKeyValueStore::purge_expired`] drops the rest in one pass.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use rebound_common::testing::{Clock, SystemClock};
use rebound_core::KeyValueStore;
use rebound_domain::{ReboundError, Result};
use regex::Regex;
use tracing::debug;

/// Longest TTL honoured; larger values are clamped
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Translate a `*`-only glob into an anchored regex
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
    Regex::new(&format!("^{body}$"))
        .map_err(|e| ReboundError::InvalidInput(format!("invalid key pattern '{pattern}': {e}")))
}

/// [`KeyValueStore`] over a `DashMap`
#[derive(Clone)]
pub struct InMemoryKeyValueStore {
    entries: Arc<DashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for InMemoryKeyValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryKeyValueStore").field("entries", &self.entries.len()).finish()
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self { entries: Arc::new(DashMap::new()), clock: Arc::new(SystemClock) }
    }

    /// Use a custom clock for TTL checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired keys");
        }
        removed
    }

    fn live(&self, key: &str) -> Option<StoredValue> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    fn insert(&self, key: &str, value: StoredValue, ttl: Duration) {
        let expires_at = expiry(self.clock.now(), ttl);
        self.entries.insert(key.to_string(), Entry { value, expires_at });
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.insert(key, StoredValue::Text(value), ttl);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let fresh = Entry { value: StoredValue::Text(value), expires_at: expiry(now, ttl) };
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.live(key) {
            Some(StoredValue::Text(text)) => Ok(Some(text)),
            Some(StoredValue::List(_)) => {
                Err(ReboundError::Store(format!("key '{key}' holds a list, not a value")))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self.entries.remove(key).is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_live(now) && matcher.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_push(&self, key: &str, value: String, ttl: Duration) -> Result<usize> {
        let now = self.clock.now();
        let expires_at = expiry(now, ttl);
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if !entry.is_live(now) {
                    entry.value = StoredValue::List(Vec::new());
                }
                match &mut entry.value {
                    StoredValue::List(items) => {
                        items.push(value);
                        entry.expires_at = expires_at;
                        Ok(items.len())
                    }
                    StoredValue::Text(_) => {
                        Err(ReboundError::Store(format!("key '{key}' holds a value, not a list")))
                    }
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry { value: StoredValue::List(vec![value]), expires_at });
                Ok(1)
            }
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        match self.live(key) {
            Some(StoredValue::List(items)) => Ok(items),
            Some(StoredValue::Text(_)) => {
                Err(ReboundError::Store(format!("key '{key}' holds a value, not a list")))
            }
            None => Ok(Vec::new()),
        }
    }
}
