//! MCP server over newline-delimited JSON-RPC on stdio.
//!
//! Each input line is one JSON-RPC message or batch. Responses are written
//! one per line; notifications produce no output. Logging goes to stderr so
//! stdout carries protocol traffic only.

pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod tools;

use crate::config::AnalysisConfig;
use crate::cortex::CortexApi;
use protocol::{error_response, success_response, RpcError, JSONRPC_VERSION, MCP_PROTOCOL_VERSION};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tools::{get_tool_definitions, is_known_tool, ToolExecutor};
use tracing::{debug, info, warn};

/// The MCP request handler.
pub struct McpServer<C: CortexApi + ?Sized> {
    name: String,
    client: Arc<C>,
    tools: ToolExecutor<C>,
}

impl<C: CortexApi + ?Sized> McpServer<C> {
    pub fn new(name: impl Into<String>, client: Arc<C>, defaults: AnalysisConfig) -> Self {
        let tools = ToolExecutor::new(Arc::clone(&client), defaults);
        Self {
            name: name.into(),
            client,
            tools,
        }
    }

    /// Serve until `reader` reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        info!("MCP server '{}' ready on stdio", self.name);

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<Value>(line) {
                Ok(incoming) => self.handle_incoming_message(incoming).await,
                Err(e) => {
                    warn!("Discarding unparseable message: {}", e);
                    Some(error_response(
                        Value::Null,
                        RpcError::parse_error(format!("Parse error: {}", e)),
                    ))
                }
            };

            let Some(response) = response else {
                continue;
            };
            let output = response.to_string();
            writer.write_all(output.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle one decoded line, a single message or a batch.
    ///
    /// Returns `None` when nothing needs answering (notifications only).
    async fn handle_incoming_message(&self, incoming: Value) -> Option<Value> {
        let Some(batch) = incoming.as_array() else {
            return self.handle_single_message(&incoming).await;
        };

        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }

        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_single_message(item).await {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    async fn handle_single_message(&self, incoming: &Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        let id = obj.get("id").cloned();

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            // Notifications are never answered, even malformed ones.
            return id.map(|id| {
                error_response(id, RpcError::invalid_request("jsonrpc must be '2.0'"))
            });
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Responses from the client; this server never sends requests.
            if obj.contains_key("result") || obj.contains_key("error") {
                return None;
            }
            return Some(error_response(
                id.unwrap_or(Value::Null),
                RpcError::invalid_request("Request must include a string 'method'"),
            ));
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match id {
            Some(id) => {
                let result = self.handle_request(method, params).await;
                Some(match result {
                    Ok(payload) => success_response(id, payload),
                    Err(err) => error_response(id, err),
                })
            }
            None => {
                debug!("Notification: {}", method);
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        debug!("Request: {}", method);

        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": get_tool_definitions() })),
            "tools/call" => {
                let params = params_object(params)?;
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::invalid_params("tools/call requires 'name'"))?;
                if !is_known_tool(name) {
                    return Err(RpcError::invalid_params(format!("Unknown tool: {}", name)));
                }
                let arguments = match params.get("arguments") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(map)) => map.clone(),
                    Some(_) => {
                        return Err(RpcError::invalid_params("'arguments' must be an object"))
                    }
                };

                let result = self.tools.execute(name, &arguments).await;
                Ok(result.to_value())
            }
            "resources/list" => Ok(resources::list_resources()),
            "resources/templates/list" => Ok(resources::list_resource_templates()),
            "resources/read" => {
                let params = params_object(params)?;
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::invalid_params("resources/read requires 'uri'"))?;
                resources::read_resource(self.client.as_ref(), uri).await
            }
            "prompts/list" => Ok(prompts::list_prompts()),
            "prompts/get" => {
                let params = params_object(params)?;
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::invalid_params("prompts/get requires 'name'"))?;
                let arguments = params
                    .get("arguments")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                prompts::get_prompt(name, &arguments)
            }
            other => Err(RpcError::method_not_found(other)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.name,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Use list_analyzers to discover analyzers, then analyze_observable_with_all_analyzers for a full verdict on an observable."
        })
    }
}

fn params_object(params: Value) -> Result<Map<String, Value>, RpcError> {
    match params {
        Value::Object(map) => Ok(map),
        _ => Err(RpcError::invalid_params("params must be an object")),
    }
}
