//! Client-side error types

use std::time::Duration;
use thiserror::Error;

/// Errors talking to the proxy or running a session
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The proxy's admission limiter refused the request
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The proxy answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    /// A send was attempted while another is still streaming
    #[error("A reply is already being streamed")]
    Busy,

    /// `retry` was called but the last turn is not an unanswered user turn
    #[error("Nothing to retry")]
    NothingToRetry,
}

impl ClientError {
    /// Whether sending the same conversation again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } | Self::Render(_) => true,
            Self::Server { status, .. } => *status >= 500,
            Self::Busy | Self::NothingToRetry => false,
        }
    }
}

/// Errors while rendering a byte stream
#[derive(Debug, Error)]
pub enum RenderError {
    /// The byte stream failed; the partial text is discarded
    #[error("Stream failed: {0}")]
    Stream(String),
}

/// Errors reading or writing persisted settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file '{path}' is not a JSON object: {message}")]
    Corrupt { path: String, message: String },
}
