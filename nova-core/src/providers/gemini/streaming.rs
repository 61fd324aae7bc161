//! Streaming support for Gemini responses

use super::converter::from_gemini_response;
use super::types::{GeminiError, GeminiResponse};
use crate::providers::adapter::{Fragment, FragmentStream};
use crate::providers::error::{ProviderError, ProviderResult};
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{stream, Stream, StreamExt};

/// Parse the Server-Sent Events stream returned with `alt=sse`
pub fn parse_stream(
    byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> FragmentStream {
    let event_stream = byte_stream.eventsource();

    Box::pin(event_stream.flat_map(|result| {
        let items: Vec<ProviderResult<Fragment>> = match result {
            Ok(event) => parse_event(&event.data),
            Err(e) => vec![Err(ProviderError::StreamInterrupted(e.to_string()))],
        };
        stream::iter(items)
    }))
}

/// Turn one SSE data payload into fragments
fn parse_event(data: &str) -> Vec<ProviderResult<Fragment>> {
    let data = data.trim();
    if data.is_empty() {
        return Vec::new();
    }

    // Errors after the headers arrive as a normal event carrying an error body
    if let Ok(error) = serde_json::from_str::<GeminiError>(data) {
        return vec![Err(ProviderError::Upstream {
            code: error.error.status,
            message: error.error.message,
        })];
    }

    match serde_json::from_str::<GeminiResponse>(data) {
        Ok(response) => {
            if let Some(usage) = &response.usage_metadata {
                tracing::trace!(
                    prompt_tokens = usage.prompt_token_count,
                    total_tokens = usage.total_token_count,
                    "Stream usage update"
                );
            }
            from_gemini_response(response).into_iter().map(Ok).collect()
        }
        Err(e) => {
            // Log parsing error but continue stream
            tracing::warn!("Failed to parse stream chunk: {}", e);
            Vec::new()
        }
    }
}
