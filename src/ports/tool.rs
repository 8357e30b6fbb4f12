use crate::error::{MeshError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Transport-agnostic tool-invocation port (C2): `call_tool(server, tool,
/// args) → result`. Concrete bindings carry JSON-RPC 2.0 framing
/// (`{jsonrpc, id, method:"tools/call", params:{name, arguments}}`) over
/// whatever transport they speak; the core only ever calls `call_tool`.
#[async_trait]
pub trait ToolInvocationPort: Send + Sync {
    async fn call_tool(&self, server_name: &str, tool_name: &str, args: Value) -> Result<Value>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: JsonRpcCallParams<'a>,
}

#[derive(Serialize)]
struct JsonRpcCallParams<'a> {
    name: &'a str,
    arguments: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

/// HTTP binding of the tool-invocation port. Each registered server is
/// addressed by a base URL; `call_tool` POSTs a `tools/call` JSON-RPC
/// envelope to `{base_url}/mcp` and unwraps the `result`/`error` reply.
pub struct HttpToolClient {
    client: reqwest::Client,
    servers: std::collections::HashMap<String, String>,
    next_id: AtomicU64,
}

impl HttpToolClient {
    pub fn new(servers: std::collections::HashMap<String, String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(MeshError::Http)?;
        Ok(Self {
            client,
            servers,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl ToolInvocationPort for HttpToolClient {
    async fn call_tool(&self, server_name: &str, tool_name: &str, args: Value) -> Result<Value> {
        let base_url = self.servers.get(server_name).ok_or_else(|| {
            MeshError::ToolError {
                server: server_name.to_string(),
                tool: tool_name.to_string(),
                message: "unknown MCP server".to_string(),
            }
        })?;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "tools/call",
            params: JsonRpcCallParams {
                name: tool_name,
                arguments: args,
            },
        };

        let response = self
            .client
            .post(format!("{base_url}/mcp"))
            .json(&request)
            .send()
            .await
            .map_err(|e| MeshError::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MeshError::TransportError(format!(
                "MCP server {server_name} returned status {}",
                response.status()
            )));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| MeshError::TransportError(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(MeshError::ToolError {
                server: server_name.to_string(),
                tool: tool_name.to_string(),
                message: format!("[{}] {}", error.code, error.message),
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
pub struct FakeToolClient {
    pub response: Result<Value>,
}

#[cfg(test)]
#[async_trait]
impl ToolInvocationPort for FakeToolClient {
    async fn call_tool(&self, _server_name: &str, _tool_name: &str, _args: Value) -> Result<Value> {
        match &self.response {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(MeshError::TransportError(e.to_string())),
        }
    }
}
