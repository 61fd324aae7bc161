//! Nova proxy server
//!
//! Exposes three endpoints in front of the orchestrator:
//!
//! - `GET /api/test`: liveness probe
//! - `POST /api/chat`: one round, collected into `{llmResponse}`
//! - `POST /api/stream`: one round, streamed as `text/plain` while it runs

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default `RUST_LOG` filter for the binary
pub const DEFAULT_LOG_FILTER: &str = "nova_server=info,nova_core=info,tower_http=info";

/// Build the router with request tracing
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/test", get(routes::test))
        .route("/api/chat", post(routes::chat))
        .route("/api/stream", post(routes::stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy admitting the configured front-end origin
pub fn cors_layer(origin: &str) -> Result<CorsLayer, header::InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}
