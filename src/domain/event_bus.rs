//! Broadcast channel for committed exchange events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The exchange
//! service publishes an [`ExchangeEvent`] after every committed batch; WebSocket
//! connections and the persistence recorder subscribe to it.

use tokio::sync::broadcast;

use super::ExchangeEvent;

/// Broadcast bus for [`ExchangeEvent`]s.
///
/// Capacity is configurable (default 10 000). Lagging receivers lose the
/// oldest events rather than blocking publishers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ExchangeEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event, returning how many receivers got it.
    ///
    /// With no active receivers the event is dropped and `0` is returned.
    pub fn publish(&self, event: ExchangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Publishes every event in order, returning the total deliveries.
    pub fn publish_all(&self, events: impl IntoIterator<Item = ExchangeEvent>) -> usize {
        events
            .into_iter()
            .map(|event| self.publish(event))
            .fold(0, usize::saturating_add)
    }

    /// Creates a receiver for all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
