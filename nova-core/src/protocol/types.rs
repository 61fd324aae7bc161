//! Core protocol types for chat rounds
//!
//! This module contains the data structures shared by the server, the
//! orchestrator and the provider adapters:
//! - client-facing messages and per-request configuration
//! - provider-format turns and parts (text, function call, function response)
//! - tool declarations, tool call requests and tool call results

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

/// Model used when a request names no model or an unknown one
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Author of a message or turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user input (also carries tool results back to the model)
    User,
    /// Model output (also carries tool call requests)
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// A message as exchanged with the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a model message
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// JSON arguments of a tool call, keyed by parameter name
pub type ToolArgs = Map<String, Value>;

/// A tool invocation requested by the model mid-stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Result payload of a tool invocation, `{result}` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub result: Value,
}

/// A tool result as appended back into history, `{name, response: {result}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub name: String,
    pub response: ToolResponse,
}

impl ToolCallResult {
    /// Wrap an opaque result value for the named tool
    pub fn new(name: impl Into<String>, result: Value) -> Self {
        Self {
            name: name.into(),
            response: ToolResponse { result },
        }
    }
}

/// A piece of a provider-format turn
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(ToolCallRequest),
    FunctionResponse(ToolCallResult),
}

/// One turn of provider-format history
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// A single-part text turn
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// The synthetic model turn that records a tool call
    pub fn function_call(call: ToolCallRequest) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::FunctionCall(call)],
        }
    }

    /// The synthetic user turn that carries a tool result
    pub fn function_response(result: ToolCallResult) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::FunctionResponse(result)],
        }
    }
}

impl From<&Message> for Turn {
    fn from(message: &Message) -> Self {
        Turn::text(message.role, message.content.clone())
    }
}

/// Append-only conversation history in provider format.
///
/// Turns can only be pushed; nothing already recorded can be removed or edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Convert client messages into provider turns, preserving order.
    ///
    /// Messages with no content are skipped; the remote service rejects
    /// empty text parts.
    pub fn from_messages(messages: &[Message]) -> Self {
        Self {
            turns: messages
                .iter()
                .filter(|message| !message.content.is_empty())
                .map(Turn::from)
                .collect(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// Declared type and description of one tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
}

impl ParameterSpec {
    pub fn new(param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.into(),
            description: description.into(),
        }
    }
}

/// A tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Add a required parameter
    pub fn with_param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.parameters.insert(name, spec);
        self
    }

    /// Add a parameter the model may omit
    pub fn with_optional_param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }
}

/// How the client paces the display of streamed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StreamMode {
    /// Append every received transport chunk as it arrives
    #[default]
    Chunk,
    /// Reveal word by word
    Word,
    /// Reveal character by character
    Character,
}

/// Per-request configuration supplied by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Requested model identifier, checked against the allow-list
    #[serde(default)]
    pub model: Option<String>,

    /// Tool name to enabled flag; tools not listed are disabled
    #[serde(default)]
    pub tools: HashMap<String, bool>,

    /// Display pacing, only meaningful to the client; unknown values fall
    /// back to the default instead of rejecting the request
    #[serde(default, deserialize_with = "lenient_stream_mode")]
    pub stream_type: StreamMode,

    /// Source tools from the MCP provider instead of the built-ins
    #[serde(default)]
    pub mcp_enabled: bool,
}

fn lenient_stream_mode<'de, D>(deserializer: D) -> Result<StreamMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl RequestConfig {
    /// Whether the named built-in tool should be offered to the model
    pub fn tool_enabled(&self, name: &str) -> bool {
        self.tools.get(name).copied().unwrap_or(false)
    }
}

/// Body of `/api/chat` and `/api/stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RequestConfig>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: None,
        }
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// Body returned by `/api/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub llm_response: String,
}
