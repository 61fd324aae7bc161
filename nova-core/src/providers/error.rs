//! Provider error types and handling

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when talking to the remote generation service
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other error the service reported, with its status code
    #[error("Upstream error {code}: {message}")]
    Upstream { code: String, message: String },

    /// Timeout occurred
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Response parsing error
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Service unavailable
    #[error("Service temporarily unavailable: {0}")]
    ServiceUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The stream ended in the middle of a response
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl ProviderError {
    /// Whether opening the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::RateLimit { .. }
                | Self::Timeout(_)
                | Self::ServiceUnavailable(_)
        )
    }

    /// Suggested delay before retrying, when the provider sent one
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::RateLimit {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ProviderError::Network(format!("Request timed out: {}", err));
        }
        if err.is_connect() {
            return ProviderError::Network(format!("Connection failed: {}", err));
        }
        if err.is_decode() || err.is_body() {
            return ProviderError::StreamInterrupted(err.to_string());
        }

        match err.status().map(|s| s.as_u16()) {
            Some(401 | 403) => ProviderError::Authentication(err.to_string()),
            Some(429) => ProviderError::RateLimit {
                message: "Too many requests".to_string(),
                retry_after_secs: None,
            },
            Some(500..=599) => ProviderError::ServiceUnavailable(err.to_string()),
            Some(code) => ProviderError::Upstream {
                code: code.to_string(),
                message: err.to_string(),
            },
            None => ProviderError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}
