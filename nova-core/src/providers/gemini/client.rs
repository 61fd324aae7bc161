//! Gemini client implementation

use super::converter::to_gemini_request;
use super::streaming::parse_stream;
use super::types::GeminiError;
use crate::config::{ProviderConfig, SecretString};
use crate::providers::adapter::{FragmentStream, GenerationProvider, GenerationRequest};
use crate::providers::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// Gemini generate-content provider
pub struct GeminiProvider {
    api_key: SecretString,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        if config.api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "Gemini API key is not set (provider.api_key or GEMINI_API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            client,
        })
    }

    /// URL of the streaming endpoint for a model
    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    /// Handle API errors
    fn handle_error_response(status: StatusCode, body: String) -> ProviderError {
        if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
            let detail = error.error;
            match detail.status.as_str() {
                "UNAUTHENTICATED" | "PERMISSION_DENIED" => {
                    ProviderError::Authentication(detail.message)
                }
                "RESOURCE_EXHAUSTED" => ProviderError::RateLimit {
                    retry_after_secs: retry_delay_from_details(&detail.details),
                    message: detail.message,
                },
                "NOT_FOUND" => ProviderError::ModelNotFound(detail.message),
                "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => {
                    ProviderError::InvalidRequest(detail.message)
                }
                "UNAVAILABLE" | "INTERNAL" => ProviderError::ServiceUnavailable(detail.message),
                "DEADLINE_EXCEEDED" => ProviderError::Timeout(0),
                _ => ProviderError::Upstream {
                    code: if detail.status.is_empty() {
                        status.to_string()
                    } else {
                        detail.status
                    },
                    message: detail.message,
                },
            }
        } else {
            // Fallback to status code-based error
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::Authentication(body)
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit {
                    message: body,
                    retry_after_secs: None,
                },
                StatusCode::BAD_REQUEST => ProviderError::InvalidRequest(body),
                StatusCode::NOT_FOUND => ProviderError::ModelNotFound(body),
                StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => ProviderError::ServiceUnavailable(body),
                _ => ProviderError::Upstream {
                    code: status.to_string(),
                    message: body,
                },
            }
        }
    }
}

/// Read the `RetryInfo.retryDelay` hint ("30s") from error details
fn retry_delay_from_details(details: &[serde_json::Value]) -> Option<u64> {
    details.iter().find_map(|detail| {
        let delay = detail.get("retryDelay")?.as_str()?;
        delay.trim_end_matches('s').parse::<f64>().ok().map(|secs| secs.ceil() as u64)
    })
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_stream(&self, request: GenerationRequest) -> ProviderResult<FragmentStream> {
        let body = to_gemini_request(&request);
        let url = self.stream_url(&request.model);

        info!(
            model = %request.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            "Opening Gemini stream"
        );

        let send = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        if response.status().is_success() {
            debug!("Gemini stream opened");
            Ok(parse_stream(response.bytes_stream()))
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(Self::handle_error_response(status, body))
        }
    }
}
