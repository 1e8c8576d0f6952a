//! Consensus error types

use aegis_types::{EventId, SignalKind, ValidatorId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsensusError {
    #[error("Validator {validator_id} already scored event {event_id}")]
    DuplicateScore {
        validator_id: ValidatorId,
        event_id: EventId,
    },

    #[error("Event not found: {0}")]
    UnknownEvent(EventId),

    #[error("Validator not found: {0}")]
    UnknownValidator(ValidatorId),

    #[error("Validator already registered: {0}")]
    DuplicateValidator(ValidatorId),

    #[error("Validator {validator_id} is not routed for {kind} signals")]
    NotRouted {
        validator_id: ValidatorId,
        kind: SignalKind,
    },

    #[error("Validator {validator_id} failed: {reason}")]
    ValidatorFailed {
        validator_id: ValidatorId,
        reason: String,
    },

    #[error("Invalid score: {0}")]
    InvalidScore(String),

    #[error("Invalid stake amount: {0}")]
    InvalidStake(f64),
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
