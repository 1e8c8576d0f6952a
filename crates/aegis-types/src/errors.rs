use thiserror::Error;

/// Errors raised when a signal fails structural validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("Latitude out of range: {0}")]
    InvalidLatitude(f64),

    #[error("Longitude out of range: {0}")]
    InvalidLongitude(f64),

    #[error("Magnitude must be a finite non-negative number: {0}")]
    InvalidMagnitude(f64),

    #[error("Confidence must lie in [0, 1]: {0}")]
    InvalidConfidence(f64),

    #[error("Unknown signal kind: {0}")]
    UnknownKind(String),
}

pub type SignalResult<T> = Result<T, SignalError>;
