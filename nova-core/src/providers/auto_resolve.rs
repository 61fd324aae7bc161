//! Provider wrapper that resolves tool calls against a remote tool source
//!
//! When a request is routed to the MCP server, tool calls never reach the
//! orchestrator: this wrapper executes them itself, appends the call and the
//! result to its private copy of the history and re-opens the generation
//! call. Downstream only ever sees text.

use crate::protocol::{ToolCallResult, Turn};
use crate::providers::adapter::{Fragment, FragmentStream, GenerationProvider, GenerationRequest};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::tools::ToolProvider;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Generation provider that resolves tool calls through a [`ToolProvider`]
pub struct AutoResolvingProvider {
    inner: Arc<dyn GenerationProvider>,
    tools: Arc<dyn ToolProvider>,
    max_remote_calls: u32,
}

impl AutoResolvingProvider {
    pub fn new(
        inner: Arc<dyn GenerationProvider>,
        tools: Arc<dyn ToolProvider>,
        max_remote_calls: u32,
    ) -> Self {
        Self {
            inner,
            tools,
            max_remote_calls,
        }
    }
}

#[async_trait]
impl GenerationProvider for AutoResolvingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_stream(&self, mut request: GenerationRequest) -> ProviderResult<FragmentStream> {
        // Declarations come from the remote source, never from the caller
        request.tools = self
            .tools
            .list_tools()
            .await
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        // Open the first call here so open failures reach the caller as errors
        let first = self.inner.generate_stream(request.clone()).await?;

        let (tx, rx) = mpsc::channel(32);
        let inner = Arc::clone(&self.inner);
        let tools = Arc::clone(&self.tools);
        let max_remote_calls = self.max_remote_calls;

        tokio::spawn(async move {
            let mut stream = first;
            let mut remote_calls = 0u32;

            loop {
                let mut pending = None;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(Fragment::Text(text)) => {
                            if tx.send(Ok(Fragment::Text(text))).await.is_err() {
                                return;
                            }
                        }
                        Ok(Fragment::ToolCalls(calls)) => {
                            pending = calls.into_iter().next();
                            break;
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }

                let Some(call) = pending else {
                    return;
                };

                remote_calls += 1;
                if remote_calls > max_remote_calls {
                    warn!(max_remote_calls, "Remote tool call limit reached");
                    let _ = tx
                        .send(Err(ProviderError::InvalidRequest(format!(
                            "More than {} remote tool calls in one round",
                            max_remote_calls
                        ))))
                        .await;
                    return;
                }

                info!(tool = %call.name, "Resolving remote tool call");
                let result = match tools.call_tool(&call).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(tool = %call.name, "Remote tool failed: {}", e);
                        Value::Null
                    }
                };
                debug!(tool = %call.name, ?result, "Remote tool result");

                let name = call.name.clone();
                request.history.push(Turn::function_call(call));
                request
                    .history
                    .push(Turn::function_response(ToolCallResult::new(name, result)));

                stream = match inner.generate_stream(request.clone()).await {
                    Ok(next) => next,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
