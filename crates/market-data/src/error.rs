//! Market data error types

use thiserror::Error;

/// Errors that can occur while acquiring or enriching an options chain
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Caller input rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Provider answered with a non-success status
    #[error("Upstream error: status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Outbound call exceeded the client timeout
    #[error("Upstream request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Connection-level failure talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Client misconfiguration (bad base URL and the like)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MarketDataError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an upstream error from a status code and response body
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Short machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Timeout(_) => "UPSTREAM_TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> Self {
        MarketDataError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_includes_status_and_body() {
        let err = MarketDataError::upstream(429, "slow down");
        assert_eq!(err.to_string(), "Upstream error: status 429: slow down");
        assert_eq!(err.code(), "UPSTREAM_ERROR");
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err: MarketDataError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, MarketDataError::Decode(_)));
    }
}
