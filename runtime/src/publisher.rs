//! Broadcast publisher for committed admission events.
//!
//! Events go onto a bounded `tokio::sync::broadcast` channel. Sending never blocks:
//! a slow subscriber lags and skips events instead of holding up admissions.

use admission_core::notify::{AdmissionEvent, EventPublisher, PublishError};
use tokio::sync::broadcast;

/// [`EventPublisher`] backed by a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<AdmissionEvent>,
}

impl BroadcastPublisher {
    /// Create a publisher whose channel buffers up to `capacity` events (at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AdmissionEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: AdmissionEvent) -> Result<(), PublishError> {
        let event_type = event.event_type();
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers(event_type))
    }
}
