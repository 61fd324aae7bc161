//! Environment variable interpolation for configuration

use super::error::ConfigError;
use super::schema::{McpConfig, NovaConfig};
use super::secrets::SecretString;
use regex::Regex;
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is a valid regex")
});

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                return Err(ConfigError::EnvVarNotFound {
                    var: var_name.to_string(),
                });
            }
        }
    }

    Ok(result)
}

/// Interpolate environment variables left in secret or URL fields after loading
pub fn interpolate_config_env_vars(config: &mut NovaConfig) -> Result<(), ConfigError> {
    let api_key = config.provider.api_key.expose_secret();
    if ENV_VAR_PATTERN.is_match(api_key) {
        config.provider.api_key = SecretString::new(interpolate_env_vars(api_key)?);
    }

    if ENV_VAR_PATTERN.is_match(&config.provider.base_url) {
        config.provider.base_url = interpolate_env_vars(&config.provider.base_url)?;
    }

    if let Some(mcp) = config.mcp.as_mut() {
        if ENV_VAR_PATTERN.is_match(&mcp.url) {
            mcp.url = interpolate_env_vars(&mcp.url)?;
        }
    }

    Ok(())
}

/// Apply the plain environment overrides the proxy honours without a file
pub fn apply_env_overrides(config: &mut NovaConfig) -> Result<(), ConfigError> {
    if let Ok(key) = env::var("GEMINI_API_KEY") {
        config.provider.api_key = SecretString::new(key);
    }

    if let Ok(port) = env::var("PORT") {
        config.server.port = port.parse().map_err(|_| ConfigError::Invalid {
            message: format!("PORT must be a port number, got '{}'", port),
        })?;
    }

    if let Ok(url) = env::var("NOVA_MCP_URL") {
        match config.mcp.as_mut() {
            Some(mcp) => mcp.url = url,
            None => config.mcp = Some(McpConfig::new(url)),
        }
    }

    Ok(())
}
