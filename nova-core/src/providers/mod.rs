//! Remote generation providers
//!
//! This module holds the provider abstraction the orchestrator consumes, the
//! Gemini adapter, retry handling for opening streams, and the wrapper that
//! resolves tool calls against a remote tool source.

pub mod adapter;
pub mod auto_resolve;
pub mod error;
pub mod gemini;
pub mod retry;

pub use adapter::{Fragment, FragmentStream, GenerationProvider, GenerationRequest};
pub use auto_resolve::AutoResolvingProvider;
pub use error::{ProviderError, ProviderResult};
pub use retry::RetryPolicy;

// Re-export concrete providers
pub use gemini::GeminiProvider;
