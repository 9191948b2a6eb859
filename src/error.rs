use thiserror::Error;

/// Initial snapshot could not be fetched from the bridge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Invalid snapshot payload: {0}")]
    Decode(String),

    #[error("Store runtime is not running")]
    Unavailable,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

/// Live stream could not be established
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Stream endpoint responded with status {0}")]
    Status(u16),

    #[error("Subscription attempt was cancelled")]
    Cancelled,

    #[error("Store runtime is not running")]
    Unavailable,
}

impl From<reqwest::Error> for SubscriptionError {
    fn from(err: reqwest::Error) -> Self {
        SubscriptionError::Connect(err.to_string())
    }
}

/// A streamed item failed schema or numeric parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEventError {
    #[error("Invalid JSON payload: {0}")]
    Json(String),

    #[error("Unexpected string payload: `{0}`")]
    UnexpectedSentinel(String),

    #[error("Transfer {id} failed validation: {reason}")]
    Schema { id: i64, reason: &'static str },

    #[error("Invalid amount `{0}`")]
    Amount(String),
}

/// User-entered filter text could not be turned into criteria
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Block filter must contain only digits, got `{0}`")]
    NotNumeric(String),
}

/// Store-visible status for the last failed boundary call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}
