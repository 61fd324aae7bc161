//! MCP server as an alternate tool source
//!
//! Speaks JSON-RPC 2.0 over the streamable HTTP transport: every request is a
//! POST; the server answers either with a JSON body or with a short SSE stream
//! carrying the response. The session id handed out by `initialize` is sent
//! back on every later request.

use super::{ToolError, ToolProvider};
use crate::config::McpConfig;
use crate::protocol::{ParameterSpec, ToolCallRequest, ToolDeclaration};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Tool entry of a `tools/list` result
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Value,
}

/// MCP client used as the alternate tool provider
pub struct McpToolProvider {
    url: String,
    client: Client,
    next_id: AtomicU64,
    session: OnceCell<Option<String>>,
    tools: RwLock<Option<Vec<ToolDeclaration>>>,
}

impl McpToolProvider {
    pub fn new(config: &McpConfig) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            client,
            next_id: AtomicU64::new(1),
            session: OnceCell::new(),
            tools: RwLock::new(None),
        })
    }

    /// Run the initialize handshake once and remember the session id
    async fn session_id(&self) -> Result<Option<String>, ToolError> {
        self.session
            .get_or_try_init(|| async {
                let params = json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "nova", "version": crate::version() }
                });
                let (result, session) = self.post("initialize", params, None).await?;
                info!(
                    server = ?result.get("serverInfo"),
                    session = ?session,
                    "MCP session initialized"
                );
                self.notify("notifications/initialized", session.as_deref())
                    .await?;
                Ok(session)
            })
            .await
            .cloned()
    }

    /// Send a request and return its result plus any session id header
    async fn post(
        &self,
        method: &str,
        params: Value,
        session: Option<&str>,
    ) -> Result<(Value, Option<String>), ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        debug!(method, id, "MCP request");

        let mut request = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(&body);
        if let Some(session) = session {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ToolError::Transport(format!(
                "{} returned {}: {}",
                method, status, text
            )));
        }

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let is_sse = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let rpc = if is_sse {
            Self::read_sse_response(response, id).await?
        } else {
            response
                .json::<RpcResponse>()
                .await
                .map_err(|e| ToolError::Transport(format!("Invalid JSON-RPC body: {}", e)))?
        };

        if let Some(error) = rpc.error {
            return Err(ToolError::Transport(format!(
                "{} failed ({}): {}",
                method, error.code, error.message
            )));
        }

        Ok((rpc.result.unwrap_or(Value::Null), session_id))
    }

    /// Read SSE events until the response with our id arrives
    async fn read_sse_response(response: reqwest::Response, id: u64) -> Result<RpcResponse, ToolError> {
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ToolError::Transport(e.to_string()))?;
            match serde_json::from_str::<RpcResponse>(&event.data) {
                Ok(rpc) if rpc.id == json!(id) => return Ok(rpc),
                Ok(_) => continue,
                Err(e) => warn!("Skipping unparseable MCP event: {}", e),
            }
        }
        Err(ToolError::Transport(format!(
            "Stream closed before response {} arrived",
            id
        )))
    }

    /// Send a notification (no id, no result expected)
    async fn notify(&self, method: &str, session: Option<&str>) -> Result<(), ToolError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(&json!({ "jsonrpc": "2.0", "method": method }));
        if let Some(session) = session {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ToolError::Transport(format!(
                "{} returned {}",
                method,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Convert an MCP tool description into a declaration
fn to_declaration(tool: McpTool) -> ToolDeclaration {
    let mut decl = ToolDeclaration::new(tool.name, tool.description.unwrap_or_default());
    let required: Vec<String> = tool
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(|n| n.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    if let Some(properties) = tool.input_schema.get("properties").and_then(Value::as_object) {
        for (name, schema) in properties {
            let spec = ParameterSpec::new(
                schema.get("type").and_then(Value::as_str).unwrap_or("string"),
                schema
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            );
            decl = if required.contains(name) {
                decl.with_param(name.clone(), spec)
            } else {
                decl.with_optional_param(name.clone(), spec)
            };
        }
    }
    decl
}

/// Reduce a `tools/call` result to the value handed back to the model
fn call_result_value(tool: &str, result: Value) -> Result<Value, ToolError> {
    let text: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(ToolError::Execution {
            tool: tool.to_string(),
            message: text.join("\n"),
        });
    }

    if let Some(structured) = result.get("structuredContent") {
        return Ok(structured.clone());
    }
    Ok(Value::String(text.join("\n")))
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDeclaration>, ToolError> {
        if let Some(cached) = self.tools.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let session = self.session_id().await?;
        let (result, _) = self
            .post("tools/list", json!({}), session.as_deref())
            .await?;

        let tools: Vec<McpTool> = serde_json::from_value(
            result.get("tools").cloned().unwrap_or_else(|| json!([])),
        )
        .map_err(|e| ToolError::Transport(format!("Invalid tools/list result: {}", e)))?;

        let declarations: Vec<ToolDeclaration> = tools.into_iter().map(to_declaration).collect();
        info!(count = declarations.len(), "Loaded MCP tools");
        *self.tools.write().await = Some(declarations.clone());
        Ok(declarations)
    }

    async fn call_tool(&self, call: &ToolCallRequest) -> Result<Value, ToolError> {
        let session = self.session_id().await?;
        let params = json!({ "name": call.name, "arguments": Value::Object(call.args.clone()) });
        let (result, _) = self.post("tools/call", params, session.as_deref()).await?;
        call_result_value(&call.name, result)
    }
}
