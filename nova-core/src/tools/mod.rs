//! Tool registry and tool sources
//!
//! The registry holds the built-in tools known at process start. It is built
//! once and shared read-only between concurrent rounds. The alternate tool
//! source (an MCP server) is described by [`ToolProvider`].

pub mod builtin;
pub mod mcp;

use crate::protocol::{RequestConfig, ToolArgs, ToolCallRequest, ToolDeclaration};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

pub use builtin::{GetRandomNumber, GetTime};
pub use mcp::McpToolProvider;

/// Errors raised while resolving or running a tool
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// No tool with this name is registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The model supplied arguments the tool cannot use
    #[error("Invalid arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    /// The tool ran and failed
    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    /// The remote tool source could not be reached or answered garbage
    #[error("Tool transport error: {0}")]
    Transport(String),
}

/// A locally executed tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declaration offered to the model
    fn declaration(&self) -> &ToolDeclaration;

    /// Run the tool with the model-supplied arguments
    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError>;
}

/// A tool source that lists and executes its own tools.
///
/// Implementations must be safe to share between concurrent rounds.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Declarations of every tool this source offers
    async fn list_tools(&self) -> Result<Vec<ToolDeclaration>, ToolError>;

    /// Execute one call and return its result value
    async fn call_tool(&self, call: &ToolCallRequest) -> Result<Value, ToolError>;
}

/// Name-keyed registry of local tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `get_time` and `get_random_number`
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GetTime::new()));
        registry.register(Arc::new(GetRandomNumber::new()));
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.declaration().name.clone();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations to offer for a request, in name order.
    ///
    /// Without a request config every registered tool is offered; with one,
    /// only the tools it switches on.
    pub fn declarations_for(&self, config: Option<&RequestConfig>) -> Vec<ToolDeclaration> {
        self.tools
            .iter()
            .filter(|(name, _)| config.is_none_or(|c| c.tool_enabled(name)))
            .map(|(_, tool)| tool.declaration().clone())
            .collect()
    }

    /// Look up and run a tool call
    pub async fn invoke(&self, call: &ToolCallRequest) -> Result<Value, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        tool.call(&call.args).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
