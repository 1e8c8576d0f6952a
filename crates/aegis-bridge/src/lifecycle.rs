//! Broadcast bus for lifecycle events

use aegis_types::{LifecycleEnvelope, LifecycleEvent};
use tokio::sync::broadcast;

/// Fan-out of [`LifecycleEvent`]s to any number of passive subscribers.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// simply dropped, and slow subscribers observe `Lagged`.
#[derive(Clone)]
pub struct LifecycleBus {
    tx: broadcast::Sender<LifecycleEnvelope>,
}

impl LifecycleBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: LifecycleEvent) {
        let envelope = LifecycleEnvelope::new(event);
        if self.tx.send(envelope).is_err() {
            tracing::trace!("Lifecycle event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEnvelope> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<LifecycleEnvelope> {
        self.tx.clone()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
