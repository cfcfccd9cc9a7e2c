//! Broadcast event bus for DLQ lifecycle events
//!
//! Every subscriber gets its own copy of each event. Delivery is lossy: a
//! subscriber that falls more than `capacity` events behind sees
//! `RecvError::Lagged` and skips ahead, and publishing with nobody listening
//! is not an error. Alert consumers must never slow down the DLQ itself.

use async_trait::async_trait;
use rebound_core::EventPublisher;
use rebound_domain::{DlqEvent, Result};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<DlqEvent>,
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl BroadcastEventBus {
    /// `capacity` is clamped to at least 1
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DlqEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventBus {
    async fn publish(&self, event: DlqEvent) -> Result<()> {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "Event broadcast"),
            Err(_) => debug!(event = name, "No subscribers, event dropped"),
        }
        Ok(())
    }
}
