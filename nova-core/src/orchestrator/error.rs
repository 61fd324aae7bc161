//! Round failure taxonomy

use crate::providers::ProviderError;
use std::time::Duration;
use thiserror::Error;

/// Result type for chat rounds
pub type ChatResult<T> = Result<T, ChatError>;

/// Ways a chat round can fail
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request carried no messages
    #[error("Conversation history is empty")]
    EmptyHistory,

    /// The generation service failed to open or broke mid-stream
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Admission refused; the caller may try again later
    #[error("Too many requests, retry after {}s", retry_after.as_secs().max(1))]
    RateLimitExceeded { retry_after: Duration },

    #[error("Round did not finish within {0:?}")]
    RoundTimeout(Duration),

    #[error("Tool '{tool}' did not finish within {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("Round exceeded {0} tool calls")]
    TooManyToolCalls(u32),

    /// The consumer of the reply went away
    #[error("Reply sink closed")]
    SinkClosed,
}
