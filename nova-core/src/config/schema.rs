//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::protocol::DEFAULT_MODEL;
use crate::providers::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Schema version accepted by this build
pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration structure for the Nova proxy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NovaConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote generation provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Model allow-list and default
    #[serde(default)]
    pub models: ModelPolicy,

    /// Orchestration bounds and system instruction
    #[serde(default)]
    pub chat: ChatConfig,

    /// Admission limiter for the streaming endpoint
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Optional MCP server used as the alternate tool provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<McpConfig>,
}

impl Default for NovaConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            models: ModelPolicy::default(),
            chat: ChatConfig::default(),
            rate_limit: RateLimitConfig::default(),
            mcp: None,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin allowed by CORS (the front-end dev server by default)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Gemini provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key (supports environment variable interpolation)
    #[serde(default)]
    pub api_key: SecretString,

    /// Base URL for the provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Retry policy for opening generation streams
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::default(),
            base_url: default_base_url(),
            timeout_secs: default_provider_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Model allow-list; unknown identifiers fall back to `default`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPolicy {
    #[serde(default = "default_model")]
    pub default: String,

    #[serde(default = "default_allowed_models")]
    pub allowed: Vec<String>,
}

impl Default for ModelPolicy {
    fn default() -> Self {
        Self {
            default: default_model(),
            allowed: default_allowed_models(),
        }
    }
}

impl ModelPolicy {
    /// Resolve the model to use for a request.
    ///
    /// Returns the effective model and whether a substitution happened.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> (&'a str, bool) {
        match requested {
            Some(model) if self.allowed.iter().any(|m| m == model) => (model, false),
            Some(_) => (&self.default, true),
            None => (&self.default, false),
        }
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// System instruction sent with every generation call
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    /// Upper bound for one complete round, tool calls included
    #[serde(default = "default_round_timeout")]
    pub round_timeout_secs: u64,

    /// Upper bound for a single tool execution
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Maximum tool round-trips per request
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_instruction: default_system_instruction(),
            round_timeout_secs: default_round_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

impl ChatConfig {
    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Admission limiter configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests admitted per one-second window
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// MCP server reachable over streamable HTTP
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct McpConfig {
    pub url: String,

    /// Remote tool calls the provider may resolve per generation call
    #[serde(default = "default_max_remote_calls")]
    pub max_remote_calls: u32,

    #[serde(default = "default_mcp_timeout")]
    pub timeout_secs: u64,
}

impl McpConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_remote_calls: default_max_remote_calls(),
            timeout_secs: default_mcp_timeout(),
        }
    }
}

// Default value functions for serde
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_cors_origin() -> String { "http://localhost:5173".to_string() }
fn default_base_url() -> String { "https://generativelanguage.googleapis.com/v1beta".to_string() }
fn default_provider_timeout() -> u64 { 60 }
fn default_model() -> String { DEFAULT_MODEL.to_string() }
fn default_allowed_models() -> Vec<String> {
    vec![
        "gemini-2.0-flash".to_string(),
        "gemini-1.5-flash".to_string(),
        "gemini-1.5-pro".to_string(),
    ]
}
fn default_system_instruction() -> String {
    "You are Nova, a concise and friendly assistant. Use the available tools when they help \
     answer the question."
        .to_string()
}
fn default_round_timeout() -> u64 { 120 }
fn default_tool_timeout() -> u64 { 10 }
fn default_max_tool_calls() -> u32 { 8 }
fn default_requests_per_second() -> u32 { 5 }
fn default_max_remote_calls() -> u32 { 10 }
fn default_mcp_timeout() -> u64 { 30 }

impl NovaConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::UnsupportedVersion {
                    supported: CONFIG_VERSION.to_string(),
                    found: self.version.clone(),
                },
            ));
        }

        if self.server.port == 0 {
            return Err(ValidationError::out_of_range("server.port", "Must be greater than 0"));
        }

        validate_http_url("provider.base_url", &self.provider.base_url)?;

        if self.provider.timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                "provider.timeout_secs",
                "Must be greater than 0",
            ));
        }

        self.models.validate("models")?;
        self.chat.validate("chat")?;

        if self.rate_limit.requests_per_second == 0 {
            return Err(ValidationError::out_of_range(
                "rate_limit.requests_per_second",
                "Must be greater than 0",
            ));
        }

        if let Some(mcp) = &self.mcp {
            validate_http_url("mcp.url", &mcp.url)?;
            if mcp.max_remote_calls == 0 {
                return Err(ValidationError::out_of_range(
                    "mcp.max_remote_calls",
                    "Must be greater than 0",
                ));
            }
        }

        Ok(())
    }
}

impl ModelPolicy {
    /// Validate the allow-list
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.allowed.is_empty() {
            return Err(ValidationError::required(format!("{}.allowed", path))
                .with_context("At least one model must be allowed"));
        }

        let mut seen = HashSet::new();
        for (i, model) in self.allowed.iter().enumerate() {
            if model.is_empty() {
                return Err(ValidationError::required(format!("{}.allowed[{}]", path, i)));
            }
            if !seen.insert(model) {
                return Err(ValidationError::new(
                    format!("{}.allowed[{}]", path, i),
                    ValidationErrorKind::Duplicate {
                        value: model.clone(),
                    },
                ));
            }
        }

        if !self.allowed.contains(&self.default) {
            return Err(ValidationError::new(
                format!("{}.default", path),
                ValidationErrorKind::Incompatible {
                    message: format!("Default model '{}' is not in the allow-list", self.default),
                },
            ));
        }

        Ok(())
    }
}

impl ChatConfig {
    /// Validate orchestration bounds
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.round_timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.round_timeout_secs", path),
                "Must be greater than 0",
            ));
        }

        if self.tool_timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.tool_timeout_secs", path),
                "Must be greater than 0",
            ));
        }

        if self.tool_timeout_secs > self.round_timeout_secs {
            return Err(ValidationError::new(
                format!("{}.tool_timeout_secs", path),
                ValidationErrorKind::Incompatible {
                    message: "Cannot exceed round_timeout_secs".to_string(),
                },
            ));
        }

        Ok(())
    }
}

fn validate_http_url(path: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::required(path));
    }

    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::invalid_url(
            path,
            format!("URL scheme must be http or https, got: {}", url.scheme()),
        )),
        Err(e) => Err(ValidationError::invalid_url(path, e.to_string())),
    }
}
