//! Endpoint handlers

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::{stream, StreamExt};
use nova_core::protocol::{ChatReply, ChatRequest};
use nova_core::orchestrator::ChatResult;
use nova_core::ChatError;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// `GET /api/test`
pub async fn test() -> Json<Value> {
    Json(json!({ "message": "Yeehaw" }))
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let request = validate(body)?;
    info!(messages = request.messages.len(), "Chat request");

    let llm_response = state
        .orchestrator
        .complete(&request.messages, request.config.as_ref())
        .await?;

    Ok(Json(ChatReply { llm_response }))
}

/// `POST /api/stream`
///
/// Failures before the first fragment become a 500 with a plain-text body.
/// Once the first fragment has been sent the status is committed, so a later
/// failure aborts the body instead of ending it cleanly.
pub async fn stream(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    state.limiter.admit()?;

    let request = validate(body)?;
    info!(messages = request.messages.len(), "Stream request");

    let (tx, mut rx) = mpsc::channel::<ChatResult<String>>(32);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let mut sink = tx.clone();
        let result = orchestrator
            .stream(&request.messages, request.config.as_ref(), &mut sink)
            .await;
        if let Err(e) = result {
            // Nobody is listening any more when the sink itself closed
            if !matches!(e, ChatError::SinkClosed) {
                let _ = tx.send(Err(e)).await;
            }
        }
    });

    let first = match rx.recv().await {
        Some(Ok(text)) => text,
        Some(Err(e)) => {
            error!("Stream failed before the first fragment: {}", e);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                e.to_string(),
            )
                .into_response());
        }
        // The round finished without producing any text
        None => String::new(),
    };

    let rest = ReceiverStream::new(rx).map(|event| {
        event.inspect_err(|e| error!("Stream failed mid-response: {}", e))
    });
    let body = stream::once(async move { Ok::<_, ChatError>(first) })
        .chain(rest)
        .map(|event| event.map(Bytes::from));

    Ok((
        [
            (header::CONTENT_TYPE, TEXT_PLAIN),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

fn validate(body: Result<Json<ChatRequest>, JsonRejection>) -> Result<ChatRequest, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest(
            "Request must include a non-empty messages array".to_string(),
        ));
    }
    Ok(request)
}
