//! Round state machine
//!
//! A round moves `Dispatching → Streaming → (ToolPending → ToolExecuting →
//! Dispatching)* → Done`, or to `Failed` from any state. [`Round::step`]
//! performs exactly one transition.

use super::error::ChatError;
use super::sink::ReplySink;
use crate::protocol::{History, ToolCallRequest, ToolCallResult, ToolDeclaration, Turn};
use crate::providers::{Fragment, FragmentStream, GenerationProvider, GenerationRequest, RetryPolicy};
use crate::tools::{ToolError, ToolRegistry};
use futures::StreamExt;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a round currently is
pub enum RoundState {
    /// About to open a generation call with the current history
    Dispatching,
    /// Relaying fragments from an open generation call
    Streaming(FragmentStream),
    /// The model asked for a tool; the rest of its stream has been dropped
    ToolPending(ToolCallRequest),
    /// The tool is running
    ToolExecuting(ToolCallRequest),
    Done,
    Failed(ChatError),
}

impl RoundState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Dispatching => "dispatching",
            Self::Streaming(_) => "streaming",
            Self::ToolPending(_) => "tool_pending",
            Self::ToolExecuting(_) => "tool_executing",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Debug for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolPending(call) | Self::ToolExecuting(call) => f
                .debug_tuple(self.label())
                .field(&call.name)
                .finish(),
            Self::Failed(error) => f.debug_tuple(self.label()).field(error).finish(),
            _ => f.write_str(self.label()),
        }
    }
}

/// Everything one round needs while it runs
pub struct Round<'a, S: ReplySink + ?Sized> {
    pub(super) provider: Arc<dyn GenerationProvider>,
    pub(super) tools: &'a ToolRegistry,
    pub(super) retry: &'a RetryPolicy,
    pub(super) model: String,
    pub(super) system_instruction: Option<String>,
    pub(super) declarations: Vec<ToolDeclaration>,
    pub(super) history: History,
    pub(super) tool_calls: u32,
    pub(super) max_tool_calls: u32,
    pub(super) tool_timeout: Duration,
    pub(super) sink: &'a mut S,
}

impl<S: ReplySink + ?Sized> Round<'_, S> {
    /// History as it stands, synthetic tool turns included
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Perform one transition
    pub async fn step(&mut self, state: RoundState) -> RoundState {
        let next = match state {
            RoundState::Dispatching => self.dispatch().await,
            RoundState::Streaming(stream) => self.relay(stream).await,
            RoundState::ToolPending(call) => self.admit_tool(call),
            RoundState::ToolExecuting(call) => self.execute_tool(call).await,
            terminal @ (RoundState::Done | RoundState::Failed(_)) => terminal,
        };
        if !matches!(next, RoundState::Streaming(_)) {
            debug!(state = ?next, "Round transition");
        }
        next
    }

    async fn dispatch(&mut self) -> RoundState {
        let mut request = GenerationRequest::new(self.model.clone(), self.history.clone())
            .with_tools(self.declarations.clone());
        if let Some(instruction) = &self.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }

        let provider = Arc::clone(&self.provider);
        let opened = self
            .retry
            .execute(|| {
                let provider = Arc::clone(&provider);
                let request = request.clone();
                async move { provider.generate_stream(request).await }
            })
            .await;

        match opened {
            Ok(stream) => RoundState::Streaming(stream),
            Err(e) => RoundState::Failed(ChatError::Provider(e)),
        }
    }

    async fn relay(&mut self, mut stream: FragmentStream) -> RoundState {
        match stream.next().await {
            Some(Ok(Fragment::Text(text))) => {
                if text.is_empty() {
                    return RoundState::Streaming(stream);
                }
                match self.sink.write(&text).await {
                    Ok(()) => RoundState::Streaming(stream),
                    Err(e) => RoundState::Failed(e),
                }
            }
            Some(Ok(Fragment::ToolCalls(calls))) => {
                if calls.len() > 1 {
                    debug!(ignored = calls.len() - 1, "Only the first tool call is served");
                }
                match calls.into_iter().next() {
                    // Dropping the stream here discards whatever the model sends after the call
                    Some(call) => RoundState::ToolPending(call),
                    None => RoundState::Streaming(stream),
                }
            }
            Some(Err(e)) => RoundState::Failed(ChatError::Provider(e)),
            None => RoundState::Done,
        }
    }

    fn admit_tool(&mut self, call: ToolCallRequest) -> RoundState {
        if self.tool_calls >= self.max_tool_calls {
            warn!(max = self.max_tool_calls, tool = %call.name, "Tool call limit reached");
            return RoundState::Failed(ChatError::TooManyToolCalls(self.max_tool_calls));
        }
        self.tool_calls += 1;
        RoundState::ToolExecuting(call)
    }

    async fn execute_tool(&mut self, call: ToolCallRequest) -> RoundState {
        let args = Value::Object(call.args.clone());
        info!(tool = %call.name, %args, "Executing tool");

        let result = match tokio::time::timeout(self.tool_timeout, self.tools.invoke(&call)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                match &e {
                    ToolError::UnknownTool(_) => warn!("Model called an unregistered tool: {}", e),
                    _ => warn!("Tool failed, returning null: {}", e),
                }
                Value::Null
            }
            Err(_) => {
                warn!(tool = %call.name, timeout = ?self.tool_timeout, "Tool timed out");
                return RoundState::Failed(ChatError::ToolTimeout {
                    tool: call.name,
                    timeout: self.tool_timeout,
                });
            }
        };

        let name = call.name.clone();
        self.history.push(Turn::function_call(call));
        self.history
            .push(Turn::function_response(ToolCallResult::new(name, result)));
        RoundState::Dispatching
    }
}
