//! Error types for aegisd

use aegis_consensus::ConsensusError;
use aegis_dispatch::DispatchError;
use aegis_types::SignalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}

impl From<ConsensusError> for DaemonError {
    fn from(err: ConsensusError) -> Self {
        DaemonError::Pipeline(err.to_string())
    }
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SignalError> for ApiError {
    fn from(err: SignalError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::UnknownResponse(_) | DispatchError::UnknownParticipant { .. } => {
                ApiError::NotFound(message)
            }
            DispatchError::DuplicateResponse(_)
            | DispatchError::DuplicateParticipant { .. }
            | DispatchError::ResponseClosed { .. } => ApiError::Conflict(message),
            DispatchError::InvalidAmount(_) | DispatchError::Payload(_) => {
                ApiError::Validation(message)
            }
            DispatchError::InsufficientFunds { .. } => ApiError::InsufficientFunds(message),
            DispatchError::Capability(_) => ApiError::Internal(message),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::InsufficientFunds(_) => (StatusCode::CONFLICT, "INSUFFICIENT_FUNDS"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_types::{ParticipantId, ResponseId};

    #[test]
    fn api_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation("x".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn dispatch_errors_map_to_http_semantics() {
        let err: ApiError = DispatchError::DuplicateParticipant {
            response_id: ResponseId::new("dao_evt_1"),
            participant_id: ParticipantId::new("red_cross"),
        }
        .into();
        assert!(matches!(err, ApiError::Conflict(_)));

        let err: ApiError = DispatchError::UnknownResponse(ResponseId::new("dao_x")).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
