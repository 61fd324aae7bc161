//! Generation provider trait
//!
//! Defines the core abstraction for the remote text-generation service. The
//! orchestrator only needs a stream of fragments in which every item is either
//! text or a batch of tool calls, and which terminates.

use crate::protocol::{History, ToolCallRequest, ToolDeclaration};
use crate::providers::error::ProviderResult;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// One item emitted by a generation stream
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Text to relay to the caller
    Text(String),
    /// The model asks for one or more tool invocations
    ToolCalls(Vec<ToolCallRequest>),
}

/// Boxed stream of generation fragments
pub type FragmentStream = Pin<Box<dyn Stream<Item = ProviderResult<Fragment>> + Send>>;

/// Everything a provider needs to open one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub history: History,
    pub system_instruction: Option<String>,
    pub tools: Vec<ToolDeclaration>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, history: History) -> Self {
        Self {
            model: model.into(),
            history,
            system_instruction: None,
            tools: Vec::new(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }
}

/// Core provider trait that remote generation services implement
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the provider's name
    fn name(&self) -> &str;

    /// Open a streaming generation call
    async fn generate_stream(&self, request: GenerationRequest) -> ProviderResult<FragmentStream>;
}
