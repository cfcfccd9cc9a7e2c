//! In-process message broker
//!
//! Holds published payloads per queue until a consumer drains them. The
//! broker can be paused, which makes every publish fail the way a broker
//! outage would; this is how end-to-end scenarios exercise the circuit
//! breaker around re-delivery.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rebound_core::MessagePublisher;
use rebound_domain::{ReboundError, Result};
use tracing::{debug, warn};

#[derive(Debug, Default, Clone)]
pub struct InMemoryBroker {
    queues: Arc<DashMap<String, VecDeque<Vec<u8>>>>,
    paused: Arc<AtomicBool>,
    published: Arc<AtomicU64>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject publishes until [`resume`](Self::resume) is called
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Pop the oldest payload of `queue`
    pub fn consume(&self, queue: &str) -> Option<Vec<u8>> {
        self.queues.get_mut(queue).and_then(|mut pending| pending.pop_front())
    }

    /// Take every pending payload of `queue`, oldest first
    pub fn drain(&self, queue: &str) -> Vec<Vec<u8>> {
        self.queues
            .get_mut(queue)
            .map(|mut pending| pending.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn pending(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |pending| pending.len())
    }

    /// Total successful publishes since creation
    pub fn published_total(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        if self.is_paused() {
            warn!(queue, "Broker paused, rejecting publish");
            return Err(ReboundError::Publish(format!(
                "broker unavailable: connection refused for queue '{queue}'"
            )));
        }
        self.queues.entry(queue.to_string()).or_default().push_back(payload.to_vec());
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(queue, bytes = payload.len(), "Payload published");
        Ok(())
    }
}
