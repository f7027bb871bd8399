use std::time::Duration;

/// Message shown for any lookup that failed before producing data.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "weather service is not available";

/// Failure to obtain a raw payload from the weather provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider returned HTTP {0}")]
    Status(u16),

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// A payload that violates the structure the parser requires.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Expected a JSON object or array: {0}")]
    NotAnObject(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Malformed(err.to_string())
    }
}

/// Why a lookup produced neither data nor an empty result.
///
/// Both kinds read the same to an end user; they stay separate so callers and
/// logs can tell a dead network from a bad payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Blocking lookup called from inside an async runtime; await the lookup instead")]
    BlockingInRuntime,
}

impl LookupError {
    pub fn user_message(&self) -> &'static str {
        SERVICE_UNAVAILABLE_MESSAGE
    }
}

/// A broker that could not be set up.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker needs a multi-thread runtime; current-thread runtimes only run tasks while blocked on")]
    CurrentThreadRuntime,

    #[error("Weather provider setup failed: {0}")]
    Provider(#[from] FetchError),
}

/// Environment configuration that could not be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}
