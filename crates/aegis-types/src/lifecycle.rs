//! Lifecycle events pushed to passive subscribers
//!
//! Every externally observable step of the pipeline publishes one of these
//! on a broadcast channel; the daemon streams them over SSE.

use crate::ids::{ComponentId, EventId, PolicyId, ResponseId};
use crate::response::{Amount, MissionOutcome};
use crate::signal::SignalKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which pool a funding failure was raised against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingPool {
    /// Shared treasury funding response allocations
    Treasury,
    /// Parametric insurance vault
    Vault,
}

/// Pipeline lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A new event entered consensus collection
    SignalIngested {
        event_id: EventId,
        kind: SignalKind,
        source: String,
    },

    /// Another source reported an event that is already known
    SignalCorroborated { event_id: EventId, source: String },

    /// The aggregator reached its one-shot decision
    DecisionReached {
        event_id: EventId,
        decision: bool,
        confidence: f64,
        positive_ratio: f64,
        participant_count: usize,
    },

    /// A response record was created and funded from the treasury
    ResponseCreated {
        event_id: EventId,
        response_id: ResponseId,
        allocation: Amount,
    },

    /// A downstream creation failed for lack of funds
    FundingFailed {
        event_id: EventId,
        pool: FundingPool,
        required: Amount,
        available: Amount,
    },

    /// A parametric policy matched and paid out
    PayoutExecuted {
        event_id: EventId,
        policy_id: PolicyId,
        amount: Amount,
    },

    /// An event never reached quorum and was dropped
    EventEvicted {
        event_id: EventId,
        scores: usize,
        refunded_stake: f64,
    },

    /// A bridge message exhausted its retries
    DeliveryFailed {
        to: ComponentId,
        topic: String,
        attempts: u32,
    },

    /// A response recorded its completion and was archived
    ResponseArchived {
        response_id: ResponseId,
        outcome: MissionOutcome,
        badges_awarded: usize,
    },
}

/// Envelope carrying id and timestamp for each published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEnvelope {
    pub id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event: LifecycleEvent,
}

impl LifecycleEnvelope {
    pub fn new(event: LifecycleEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event,
        }
    }
}
