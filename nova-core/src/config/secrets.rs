//! Secret values in configuration
//!
//! API keys are wrapped in [`SecretString`] so that `Debug` and `Display`
//! output (and therefore every `tracing` field) never contains the raw value.

use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for the one place it is sent upstream
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First four and last two characters, enough to tell keys apart in logs
    pub fn hint(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        match chars.len() {
            0 => "[EMPTY]".to_string(),
            n if n <= 8 => REDACTED.to_string(),
            n => format!(
                "{}...{}",
                chars[..4].iter().collect::<String>(),
                chars[n - 2..].iter().collect::<String>()
            ),
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let secret = SecretString::new("AIzaSyExampleKey1234");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "AIzaSyExampleKey1234");
    }

    #[test]
    fn test_hint() {
        assert_eq!(SecretString::default().hint(), "[EMPTY]");
        assert_eq!(SecretString::new("short").hint(), "[REDACTED]");
        assert_eq!(SecretString::new("AIzaSyExampleKey1234").hint(), "AIza...34");
    }

    #[test]
    fn test_serializes_transparently() {
        let secret = SecretString::new("abc");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"abc\"");
    }
}
