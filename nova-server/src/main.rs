use anyhow::Context;
use nova_core::config;
use nova_core::providers::GeminiProvider;
use nova_core::tools::{McpToolProvider, ToolRegistry};
use nova_core::{AdmissionLimiter, Orchestrator};
use nova_server::{app, cors_layer, AppState, DEFAULT_LOG_FILTER};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = config::load().context("Failed to load configuration")?;
    if config.provider.api_key.is_empty() {
        anyhow::bail!("provider.api_key is empty; set GEMINI_API_KEY or NOVA_CONFIG");
    }

    let provider = Arc::new(GeminiProvider::new(&config.provider)?);
    let mut orchestrator = Orchestrator::from_config(provider, ToolRegistry::builtin(), &config);

    if let Some(mcp) = &config.mcp {
        let tools = McpToolProvider::new(mcp)?;
        orchestrator = orchestrator.with_tool_provider(Arc::new(tools), mcp.max_remote_calls);
        info!(url = %mcp.url, "MCP tool provider enabled");
    }

    let state = AppState::new(orchestrator, AdmissionLimiter::from_config(&config.rate_limit));
    let router = app(state).layer(
        cors_layer(&config.server.cors_origin)
            .with_context(|| format!("Invalid CORS origin '{}'", config.server.cors_origin))?,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        addr = %listener.local_addr()?,
        default_model = %config.models.default,
        api_key = %config.provider.api_key.hint(),
        "Nova proxy listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Nova proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
