use aegis_types::ComponentId;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("No mailbox registered for component '{0}'")]
    UnknownComponent(ComponentId),

    #[error("Mailbox for component '{0}' is full")]
    MailboxFull(ComponentId),

    #[error("Mailbox for component '{0}' is closed")]
    MailboxClosed(ComponentId),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
