//! Protocol module for chat request/response structures
//!
//! This module defines the canonical data models shared by the proxy server,
//! the orchestrator and the provider adapters. Client-facing types use the
//! JSON shapes the browser front-end sends; provider-facing turns carry the
//! synthetic tool call and tool result parts.

pub mod types;

pub use types::{
    ChatReply, ChatRequest, History, Message, ParameterSpec, Part, RequestConfig, Role,
    StreamMode, ToolArgs, ToolCallRequest, ToolCallResult, ToolDeclaration, ToolResponse, Turn,
    DEFAULT_MODEL,
};
