//! Persisted client settings
//!
//! Settings live in a small key-value file (a JSON object of string values)
//! under the key `nova-config`, the same key the browser front-end used for
//! its local storage. Other keys in the file are preserved on save.

use crate::error::SettingsError;
use nova_core::protocol::{RequestConfig, StreamMode, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Key under which the settings are stored
pub const SETTINGS_KEY: &str = "nova-config";

/// Built-in tools the settings can toggle
pub const KNOWN_TOOLS: [&str; 2] = ["get_time", "get_random_number"];

/// User choices sent with every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    pub model: String,
    pub tools: BTreeMap<String, bool>,
    pub stream_type: StreamMode,
    pub mcp_enabled: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            tools: KNOWN_TOOLS
                .iter()
                .map(|name| (name.to_string(), false))
                .collect(),
            stream_type: StreamMode::Chunk,
            mcp_enabled: false,
        }
    }
}

impl ClientSettings {
    pub fn set_tool(&mut self, name: impl Into<String>, enabled: bool) {
        self.tools.insert(name.into(), enabled);
    }

    /// Per-request configuration carrying these settings
    pub fn to_request_config(&self) -> RequestConfig {
        RequestConfig {
            model: Some(self.model.clone()),
            tools: self
                .tools
                .iter()
                .map(|(name, enabled)| (name.clone(), *enabled))
                .collect::<HashMap<_, _>>(),
            stream_type: self.stream_type,
            mcp_enabled: self.mcp_enabled,
        }
    }
}

/// Key-value file holding the settings
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults when none are stored.
    ///
    /// An unreadable entry under the key is logged and replaced by defaults;
    /// a file that is not a JSON object at all is an error.
    pub fn load(&self) -> Result<ClientSettings, SettingsError> {
        let entries = self.read_entries()?;
        let Some(stored) = entries.get(SETTINGS_KEY).and_then(Value::as_str) else {
            return Ok(ClientSettings::default());
        };

        match serde_json::from_str(stored) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unreadable settings: {}", e);
                Ok(ClientSettings::default())
            }
        }
    }

    /// Store settings under [`SETTINGS_KEY`], keeping other keys intact
    pub fn save(&self, settings: &ClientSettings) -> Result<(), SettingsError> {
        let mut entries = self.read_entries()?;
        let serialized = serde_json::to_string(settings).map_err(|e| self.corrupt(e))?;
        entries.insert(SETTINGS_KEY.to_string(), Value::String(serialized));

        let contents =
            serde_json::to_string_pretty(&Value::Object(entries)).map_err(|e| self.corrupt(e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        fs::write(&self.path, contents).map_err(|e| self.io(e))
    }

    fn read_entries(&self) -> Result<Map<String, Value>, SettingsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io(e)),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(other) => Err(SettingsError::Corrupt {
                path: self.path.display().to_string(),
                message: format!("expected an object, found {}", other),
            }),
            Err(e) => Err(self.corrupt(e)),
        }
    }

    fn io(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn corrupt(&self, e: serde_json::Error) -> SettingsError {
        SettingsError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}
