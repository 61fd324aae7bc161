//! Configuration module for the Nova proxy
//!
//! This module provides the configuration schema, environment interpolation
//! and validation. A configuration can come from a YAML or JSON file, or from
//! defaults plus a handful of environment variables (`GEMINI_API_KEY`, `PORT`,
//! `NOVA_MCP_URL`).

mod env;
mod error;
mod schema;
mod secrets;

pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    ChatConfig, McpConfig, ModelPolicy, NovaConfig, ProviderConfig, RateLimitConfig,
    ServerConfig, CONFIG_VERSION,
};
pub use secrets::SecretString;

use std::fs;
use std::path::Path;

/// Environment variable naming a configuration file
pub const CONFIG_PATH_ENV: &str = "NOVA_CONFIG";

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<NovaConfig> {
    let path = path.as_ref();
    let content = read_config(path)?;

    // Interpolate environment variables before parsing
    let interpolated = env::interpolate_env_vars(&content)?;

    let mut config: NovaConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    env::interpolate_config_env_vars(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<NovaConfig> {
    let path = path.as_ref();
    let content = read_config(path)?;

    let interpolated = env::interpolate_env_vars(&content)?;

    let mut config: NovaConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    env::interpolate_config_env_vars(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration file, picking the format from its extension
pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<NovaConfig> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => load_from_json(path),
        Some("yaml") | Some("yml") => load_from_yaml(path),
        other => Err(ConfigError::Invalid {
            message: format!(
                "Unsupported config extension {:?} for '{}'",
                other,
                path.display()
            ),
        }),
    }
}

/// Build the runtime configuration.
///
/// Reads the file named by `NOVA_CONFIG` when set, otherwise starts from the
/// defaults; environment overrides are applied last in both cases.
pub fn load() -> ConfigResult<NovaConfig> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(path)?,
        Err(_) => NovaConfig::default(),
    };

    env::apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_yaml() {
        let yaml = r#"
version: "0.1"
server:
  port: 8080
provider:
  api_key: test-key
  base_url: https://generativelanguage.googleapis.com/v1beta
models:
  default: gemini-2.0-flash
  allowed:
    - gemini-2.0-flash
    - gemini-1.5-pro
rate_limit:
  requests_per_second: 2
"#;
        let config: NovaConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.models.allowed.len(), 2);
        assert_eq!(config.rate_limit.requests_per_second, 2);
        assert!(config.mcp.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = r#"
version: "0.1"
servr:
  port: 8080
"#;
        assert!(serde_yaml::from_str::<NovaConfig>(yaml).is_err());
    }
}
