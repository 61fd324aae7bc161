//! Built-in tools

use super::{Tool, ToolError};
use crate::protocol::{ParameterSpec, ToolArgs, ToolDeclaration};
use async_trait::async_trait;
use chrono::Local;
use rand::Rng;
use serde_json::{json, Value};

/// Reports the current local date and time
pub struct GetTime {
    declaration: ToolDeclaration,
}

impl GetTime {
    pub fn new() -> Self {
        Self {
            declaration: ToolDeclaration::new(
                "get_time",
                "Get the current date and time of the server, including its UTC offset.",
            ),
        }
    }
}

impl Default for GetTime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetTime {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn call(&self, _args: &ToolArgs) -> Result<Value, ToolError> {
        let now = Local::now();
        Ok(json!({
            "iso8601": now.to_rfc3339(),
            "readable": now.format("%A, %B %-d, %Y %-I:%M:%S %p").to_string(),
            "utc_offset": now.format("%:z").to_string(),
        }))
    }
}

/// Draws a uniform random integer from an inclusive range
pub struct GetRandomNumber {
    declaration: ToolDeclaration,
}

impl GetRandomNumber {
    pub fn new() -> Self {
        Self {
            declaration: ToolDeclaration::new(
                "get_random_number",
                "Get a random integer between min and max, both inclusive.",
            )
            .with_param("min", ParameterSpec::new("number", "Smallest value that may be returned"))
            .with_param("max", ParameterSpec::new("number", "Largest value that may be returned")),
        }
    }

    fn integer_arg(args: &ToolArgs, name: &str) -> Result<i64, ToolError> {
        let invalid = |message: String| ToolError::InvalidArguments {
            tool: "get_random_number".to_string(),
            message,
        };

        let value = args
            .get(name)
            .ok_or_else(|| invalid(format!("missing '{}'", name)))?;

        // The model sends JSON numbers, sometimes as 1.0 instead of 1
        if let Some(n) = value.as_i64() {
            Ok(n)
        } else if let Some(f) = value.as_f64().filter(|f| f.is_finite()) {
            Ok(f.round() as i64)
        } else if let Some(n) = value.as_str().and_then(|s| s.trim().parse::<i64>().ok()) {
            Ok(n)
        } else {
            Err(invalid(format!("'{}' must be a number, got {}", name, value)))
        }
    }
}

impl Default for GetRandomNumber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetRandomNumber {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let min = Self::integer_arg(args, "min")?;
        let max = Self::integer_arg(args, "max")?;
        if min > max {
            return Err(ToolError::InvalidArguments {
                tool: "get_random_number".to_string(),
                message: format!("min ({}) is greater than max ({})", min, max),
            });
        }

        Ok(json!(rand::thread_rng().gen_range(min..=max)))
    }
}
