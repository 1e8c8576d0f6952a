//! Aegis bridge: point-to-point messaging between pipeline components.
//!
//! Transport adapters only move messages. The [`Bridge`] on top of them owns
//! delivery policy: a bounded number of attempts with a fixed delay, then an
//! explicit dead-letter record. A failed delivery never fails the caller.
//!
//! The crate also carries the [`LifecycleBus`], the broadcast channel every
//! component publishes [`aegis_types::LifecycleEvent`]s on.

#![deny(unsafe_code)]

pub mod bridge;
pub mod dead_letter;
pub mod error;
pub mod lifecycle;
pub mod transport;

pub use bridge::{Bridge, Delivery, RetryPolicy};
pub use dead_letter::{DeadLetter, DeadLetterLog};
pub use error::{TransportError, TransportResult};
pub use lifecycle::LifecycleBus;
pub use transport::{BridgeMessage, InMemoryTransport, Mailbox, Transport};
