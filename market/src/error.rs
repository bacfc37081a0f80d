use thiserror::Error;

/// Failures of a single unit of market work.
///
/// All variants are recoverable: callers log them and skip the unit for the
/// current cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    /// Timeout, connection failure or non-success HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// Missing or malformed fields in a provider response.
    #[error("invalid data: {0}")]
    DataFormat(String),

    #[error("insufficient data: {len} points, need at least {required}")]
    InsufficientData { len: usize, required: usize },
}

impl From<reqwest::Error> for MarketError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            MarketError::DataFormat(e.to_string())
        } else {
            MarketError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(e: serde_json::Error) -> Self {
        MarketError::DataFormat(e.to_string())
    }
}
