//! Mutation event channel.
//!
//! Every repository write publishes a [`StoreEvent`] after the row is
//! durable and the cache invalidated, so UI layers and sync collaborators
//! can subscribe without the storage core knowing about them. The channel
//! is a bounded broadcast; a subscriber that falls behind loses the oldest
//! events (`RecvError::Lagged`), never blocks writers.

use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub table: &'static str,
    pub op: ChangeOp,
    pub id: String,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publish a mutation event. No subscribers is not an error.
    pub fn publish(&self, table: &'static str, op: ChangeOp, id: &str) {
        let _ = self.tx.send(StoreEvent {
            table,
            op,
            id: id.to_string(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish("patients", ChangeOp::Created, "p-1");
        bus.publish("patients", ChangeOp::Deleted, "p-1");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.table, "patients");
        assert_eq!(first.op, ChangeOp::Created);
        assert_eq!(first.id, "p-1");

        let second = rx.try_recv().unwrap();
        assert_eq!(second.op, ChangeOp::Deleted);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish("referrals", ChangeOp::Updated, "r-1");
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish("patients", ChangeOp::Created, "p-1");
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
