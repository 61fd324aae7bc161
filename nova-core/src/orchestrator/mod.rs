//! Streaming chat orchestration
//!
//! The orchestrator turns a client history into a finished reply: it opens a
//! generation call, relays text as it arrives, and whenever the model asks for
//! a tool it runs the tool, records the call and its result in the history and
//! opens the next call. A round ends when a generation call completes without
//! asking for a tool.
//!
//! ```no_run
//! use nova_core::orchestrator::Orchestrator;
//! use nova_core::protocol::Message;
//! # async fn demo(orchestrator: Orchestrator) -> Result<(), nova_core::orchestrator::ChatError> {
//! let reply = orchestrator.complete(&[Message::user("What time is it?")], None).await?;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```

mod error;
mod sink;
mod state;

pub use error::{ChatError, ChatResult};
pub use sink::ReplySink;
pub use state::{Round, RoundState};

use crate::config::{ChatConfig, ModelPolicy, NovaConfig};
use crate::protocol::{History, Message, RequestConfig};
use crate::providers::{AutoResolvingProvider, GenerationProvider, RetryPolicy};
use crate::tools::{ToolProvider, ToolRegistry};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Drives chat rounds against a generation provider
pub struct Orchestrator {
    provider: Arc<dyn GenerationProvider>,
    alternate: Option<Arc<dyn GenerationProvider>>,
    tools: Arc<ToolRegistry>,
    models: ModelPolicy,
    chat: ChatConfig,
    retry: RetryPolicy,
}

impl Orchestrator {
    /// Create an orchestrator with default settings and the given tools
    pub fn new(provider: Arc<dyn GenerationProvider>, tools: ToolRegistry) -> Self {
        Self {
            provider,
            alternate: None,
            tools: Arc::new(tools),
            models: ModelPolicy::default(),
            chat: ChatConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create an orchestrator configured from a loaded [`NovaConfig`]
    pub fn from_config(
        provider: Arc<dyn GenerationProvider>,
        tools: ToolRegistry,
        config: &NovaConfig,
    ) -> Self {
        Self::new(provider, tools)
            .with_models(config.models.clone())
            .with_chat_config(config.chat.clone())
            .with_retry(config.provider.retry.clone())
    }

    pub fn with_models(mut self, models: ModelPolicy) -> Self {
        self.models = models;
        self
    }

    pub fn with_chat_config(mut self, chat: ChatConfig) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Route `mcpEnabled` requests through a remote tool source
    pub fn with_tool_provider(mut self, tools: Arc<dyn ToolProvider>, max_remote_calls: u32) -> Self {
        self.alternate = Some(Arc::new(AutoResolvingProvider::new(
            Arc::clone(&self.provider),
            tools,
            max_remote_calls,
        )));
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn has_tool_provider(&self) -> bool {
        self.alternate.is_some()
    }

    /// Run one round, writing reply text to `sink` as it arrives.
    ///
    /// Text already written stays written when the round fails later.
    pub async fn stream<S>(
        &self,
        messages: &[Message],
        config: Option<&RequestConfig>,
        sink: &mut S,
    ) -> ChatResult<()>
    where
        S: ReplySink + ?Sized,
    {
        if messages.is_empty() {
            return Err(ChatError::EmptyHistory);
        }

        let span = info_span!("round", id = %Uuid::new_v4());
        let round_timeout = self.chat.round_timeout();

        async {
            let mut round = self.prepare(messages, config, sink);
            let run = async {
                let mut state = RoundState::Dispatching;
                while !state.is_terminal() {
                    state = round.step(state).await;
                }
                state
            };

            let outcome = tokio::time::timeout(round_timeout, run).await;
            match outcome {
                Ok(RoundState::Failed(e)) => {
                    warn!("Round failed: {}", e);
                    Err(e)
                }
                Ok(_) => {
                    info!(tool_calls = round.tool_calls, "Round complete");
                    Ok(())
                }
                Err(_) => {
                    warn!(timeout = ?round_timeout, "Round timed out");
                    Err(ChatError::RoundTimeout(round_timeout))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run one round and return the concatenated reply
    pub async fn complete(
        &self,
        messages: &[Message],
        config: Option<&RequestConfig>,
    ) -> ChatResult<String> {
        let mut reply = String::new();
        self.stream(messages, config, &mut reply).await?;
        Ok(reply)
    }

    fn prepare<'a, S>(
        &'a self,
        messages: &[Message],
        config: Option<&RequestConfig>,
        sink: &'a mut S,
    ) -> Round<'a, S>
    where
        S: ReplySink + ?Sized,
    {
        let requested = config.and_then(|c| c.model.as_deref());
        let (model, substituted) = self.models.resolve(requested);
        if substituted {
            warn!(
                requested = requested.unwrap_or_default(),
                model, "Unknown model requested, using default"
            );
        }

        let wants_mcp = config.is_some_and(|c| c.mcp_enabled);
        let (provider, declarations) = match (&self.alternate, wants_mcp) {
            // The alternate provider brings its own declarations
            (Some(alternate), true) => (Arc::clone(alternate), Vec::new()),
            (None, true) => {
                warn!("MCP requested but no MCP server is configured, using built-in tools");
                (Arc::clone(&self.provider), self.tools.declarations_for(config))
            }
            (_, false) => (Arc::clone(&self.provider), self.tools.declarations_for(config)),
        };

        info!(
            model,
            messages = messages.len(),
            tools = declarations.len(),
            mcp = wants_mcp && self.alternate.is_some(),
            "Starting round"
        );

        let system_instruction = Some(self.chat.system_instruction.clone())
            .filter(|instruction| !instruction.trim().is_empty());

        Round {
            provider,
            tools: &self.tools,
            retry: &self.retry,
            model: model.to_string(),
            system_instruction,
            declarations,
            history: History::from_messages(messages),
            tool_calls: 0,
            max_tool_calls: self.chat.max_tool_calls,
            tool_timeout: self.chat.tool_timeout(),
            sink,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("tool_provider", &self.alternate.is_some())
            .field("tools", &self.tools)
            .field("models", &self.models)
            .finish()
    }
}
