//! Gemini provider implementation
//!
//! This module provides an adapter for the Gemini `streamGenerateContent`
//! API, translating between Nova's protocol types and Gemini's format.

mod client;
pub mod converter;
mod streaming;
pub mod types;

pub use client::GeminiProvider;
pub use types::{GeminiRequest, GeminiResponse};
