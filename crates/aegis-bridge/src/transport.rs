//! Transport boundary and the in-memory mailbox transport

use crate::error::{TransportError, TransportResult};
use aegis_types::ComponentId;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// A single message addressed to one component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub id: Uuid,
    pub from: ComponentId,
    pub to: ComponentId,
    /// Message type understood by the receiving component (`notify`, `plan` ...)
    pub topic: String,
    pub payload: serde_json::Value,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

impl BridgeMessage {
    pub fn new(
        from: ComponentId,
        to: ComponentId,
        topic: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            topic: topic.into(),
            payload,
            sent_at: chrono::Utc::now(),
        }
    }
}

/// Trait for transport adapters.
///
/// One call is one delivery attempt; retry belongs to the [`crate::Bridge`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, message: &BridgeMessage) -> TransportResult<()>;
}

/// Receiving end of a component mailbox
pub struct Mailbox {
    component: ComponentId,
    rx: mpsc::Receiver<BridgeMessage>,
}

impl Mailbox {
    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    /// Wait for the next message; `None` once the transport drops the sender
    pub async fn recv(&mut self) -> Option<BridgeMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BridgeMessage> {
        self.rx.try_recv().ok()
    }
}

/// In-process transport: one bounded mpsc mailbox per registered component.
pub struct InMemoryTransport {
    mailboxes: DashMap<ComponentId, mpsc::Sender<BridgeMessage>>,
    capacity: usize,
}

impl InMemoryTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            mailboxes: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a component and hand back its mailbox.
    ///
    /// Registering the same id again replaces the previous mailbox.
    pub fn register(&self, component: ComponentId) -> Mailbox {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.mailboxes.insert(component.clone(), tx);
        tracing::debug!(component = %component, "Mailbox registered");
        Mailbox { component, rx }
    }

    pub fn unregister(&self, component: &ComponentId) {
        self.mailboxes.remove(component);
    }

    pub fn is_registered(&self, component: &ComponentId) -> bool {
        self.mailboxes.contains_key(component)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn deliver(&self, message: &BridgeMessage) -> TransportResult<()> {
        let sender = self
            .mailboxes
            .get(&message.to)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::UnknownComponent(message.to.clone()))?;

        sender.try_send(message.clone()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => TransportError::MailboxFull(message.to.clone()),
            mpsc::error::TrySendError::Closed(_) => {
                TransportError::MailboxClosed(message.to.clone())
            }
        })
    }
}
