//! Nova Core Library
//!
//! This crate provides the chat orchestration behind the Nova proxy: protocol
//! types, configuration, the Gemini streaming adapter, tools, and the
//! orchestrator that ties them together.

pub mod config;
pub mod orchestrator;
pub mod protocol;
pub mod providers;
pub mod rate_limit;
pub mod tools;

pub use orchestrator::{ChatError, Orchestrator, ReplySink};
pub use rate_limit::AdmissionLimiter;

/// Returns the version of the Nova Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
