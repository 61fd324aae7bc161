//! HTTP error responses

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use nova_core::ChatError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced to HTTP clients as JSON `{error}` bodies
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Chat(ChatError::EmptyHistory) => StatusCode::BAD_REQUEST,
            Self::Chat(ChatError::RateLimitExceeded { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Self::Chat(ChatError::Provider(_)) => StatusCode::BAD_GATEWAY,
            Self::Chat(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Chat(ChatError::RateLimitExceeded { retry_after }) => Some(*retry_after),
            _ => None,
        }
    }
}

/// Whole seconds for a `Retry-After` header, never zero
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_secs_f64().ceil().max(1.0) as u64
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", self);
        }

        match self.retry_after() {
            Some(retry_after) => {
                let secs = retry_after_secs(retry_after);
                let body = Json(json!({ "error": self.to_string(), "retryAfterSecs": secs }));
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            None => (status, Json(json!({ "error": self.to_string() }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_core::providers::ProviderError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Chat(ChatError::EmptyHistory).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Chat(ChatError::Provider(ProviderError::Timeout(5))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Chat(ChatError::RoundTimeout(Duration::from_secs(1))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after_header() {
        let response = ApiError::Chat(ChatError::RateLimitExceeded {
            retry_after: Duration::from_millis(300),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
