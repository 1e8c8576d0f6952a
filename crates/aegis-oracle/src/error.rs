use thiserror::Error;

/// Errors fetching a native payload
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source returned HTTP {status}")]
    Status { status: u16 },

    #[error("Feed exhausted")]
    Exhausted,

    #[error("Feed unavailable: {0}")]
    Unavailable(String),
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Errors parsing a native payload
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Malformed CSV: {0}")]
    Csv(String),
}

pub type ParseResult<T> = Result<T, ParseError>;
