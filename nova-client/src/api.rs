//! HTTP client for the proxy endpoints

use crate::error::ClientError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use nova_core::protocol::{ChatReply, ChatRequest, Message, RequestConfig};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw reply bytes as the proxy sends them
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Default proxy location used by the browser front-end
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Client for `/api/test`, `/api/chat` and `/api/stream`
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    http: Client,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Liveness probe; returns the server's message
    pub async fn test(&self) -> Result<String, ClientError> {
        let response = check(self.http.get(self.url("test")).send().await?).await?;
        let body: Value = response.json().await?;
        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Run one round and wait for the whole reply
    pub async fn chat(
        &self,
        messages: &[Message],
        config: Option<&RequestConfig>,
    ) -> Result<String, ClientError> {
        let body = request_body(messages, config);
        let response = check(self.http.post(self.url("chat")).json(&body).send().await?).await?;
        let reply: ChatReply = response.json().await?;
        Ok(reply.llm_response)
    }

    /// Run one round and receive the reply as it is produced
    pub async fn stream(
        &self,
        messages: &[Message],
        config: Option<&RequestConfig>,
    ) -> Result<ByteStream, ClientError> {
        let body = request_body(messages, config);
        let response = check(self.http.post(self.url("stream")).json(&body).send().await?).await?;
        debug!(status = %response.status(), "Reply stream opened");
        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from)),
        ))
    }
}

fn request_body(messages: &[Message], config: Option<&RequestConfig>) -> ChatRequest {
    let request = ChatRequest::new(messages.to_vec());
    match config {
        Some(config) => request.with_config(config.clone()),
        None => request,
    }
}

/// Map non-success statuses to [`ClientError`]
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header_retry = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let text = response.text().await.unwrap_or_default();
    let json = serde_json::from_str::<Value>(&text).ok();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let body_retry = json
            .as_ref()
            .and_then(|b| b.get("retryAfterSecs"))
            .and_then(Value::as_u64);
        let retry_after = header_retry.or(body_retry).map(Duration::from_secs);
        warn!(?retry_after, "Proxy rate limited the request");
        return Err(ClientError::RateLimited { retry_after });
    }

    let message = json
        .as_ref()
        .and_then(|b| b.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(text);
    warn!(status = status.as_u16(), "Proxy returned an error: {}", message);
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}
