//! Dispatch error types

use aegis_types::{Amount, FundingPool, ParticipantId, ResponseId, ResponseStatus};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Insufficient {pool:?} funds: required {required}, available {available}")]
    InsufficientFunds {
        pool: FundingPool,
        required: Amount,
        available: Amount,
    },

    #[error("Response not found: {0}")]
    UnknownResponse(ResponseId),

    #[error("Response already exists: {0}")]
    DuplicateResponse(ResponseId),

    #[error("Participant {participant_id} already joined {response_id}")]
    DuplicateParticipant {
        response_id: ResponseId,
        participant_id: ParticipantId,
    },

    #[error("Participant {participant_id} is not part of {response_id}")]
    UnknownParticipant {
        response_id: ResponseId,
        participant_id: ParticipantId,
    },

    #[error("Response {response_id} is {status:?} and no longer accepts changes")]
    ResponseClosed {
        response_id: ResponseId,
        status: ResponseStatus,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Capability failed: {0}")]
    Capability(String),

    #[error("Malformed message payload: {0}")]
    Payload(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Payload(err.to_string())
    }
}
