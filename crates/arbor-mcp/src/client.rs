use anyhow::{anyhow, Context, Result};
use arbor_llm::{Property, Tool};
use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

use crate::transport::{ToolCatalog, ToolTransport};

/// How to launch one MCP server as a child process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Extra system text contributed while any of this server's tools is in scope
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// MCP client connected to a single server over stdio
pub struct McpClient {
    server_name: String,
    service: RunningService<RoleClient, ()>,
}

impl McpClient {
    /// Spawn the server process and complete the MCP handshake
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn run() -> anyhow::Result<()> {
    /// use arbor_mcp::{McpClient, McpServerConfig};
    ///
    /// let config = McpServerConfig {
    ///     command: "python3".into(),
    ///     args: vec!["weather.py".into()],
    ///     ..Default::default()
    /// };
    /// let client = McpClient::connect("weather", &config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(server_name: impl Into<String>, config: &McpServerConfig) -> Result<Self> {
        let server_name = server_name.into();

        // Build and configure command
        let cmd = Command::new(&config.command).configure(|c| {
            c.args(&config.args);
            c.envs(&config.env);
            c.stdin(Stdio::piped());
            c.stdout(Stdio::piped());
            c.stderr(Stdio::inherit());
        });

        // Spawn MCP server process and connect
        let transport = TokioChildProcess::new(cmd)
            .with_context(|| format!("Failed to spawn MCP server '{}'", server_name))?;
        let service = ().serve(transport).await?;

        tracing::info!(server = %server_name, command = %config.command, "Connected to MCP server");
        Ok(Self { server_name, service })
    }

    pub fn name(&self) -> &str {
        &self.server_name
    }

    /// Instructions from the server's initialize response, if any
    pub fn instructions(&self) -> Option<String> {
        let info = serde_json::to_value(self.service.peer_info()?).ok()?;
        info.get("instructions")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }

    /// List all tools the server exposes
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let tools = self.service.list_all_tools().await?;
        tools
            .iter()
            .map(|tool| tool_from_wire(serde_json::to_value(tool)?))
            .collect()
    }

    /// Call a tool and flatten its content into text
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<String> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await?;
        let (text, is_error) = result_text(serde_json::to_value(&result)?);
        if is_error {
            return Err(anyhow!(text));
        }
        Ok(text)
    }

    /// Shut the server down
    pub async fn close(self) -> Result<()> {
        self.service.cancel().await?;
        Ok(())
    }
}

fn tool_from_wire(value: Value) -> Result<Tool> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("MCP tool definition without a name"))?;
    let description = value.get("description").and_then(Value::as_str).unwrap_or_default();

    // Schemas this runtime cannot model (e.g. type unions) fall back to a bare object
    let parameters = value
        .get("inputSchema")
        .cloned()
        .and_then(|schema| serde_json::from_value::<Property>(schema).ok())
        .unwrap_or_else(Property::object);

    Ok(Tool::new(name, description, parameters))
}

fn result_text(value: Value) -> (String, bool) {
    let is_error = value.get("isError").and_then(Value::as_bool).unwrap_or(false);

    let mut parts = Vec::new();
    for item in value.get("content").and_then(Value::as_array).into_iter().flatten() {
        match item.get("text").and_then(Value::as_str) {
            Some(text) => parts.push(text.to_string()),
            None => {
                let kind = item.get("type").and_then(Value::as_str).unwrap_or("unknown");
                parts.push(format!("[{} content]", kind));
            }
        }
    }
    if parts.is_empty() {
        if let Some(structured) = value.get("structuredContent") {
            parts.push(structured.to_string());
        }
    }

    (parts.join("\n"), is_error)
}

/// [`ToolTransport`] over a set of MCP servers
pub struct McpTransport {
    clients: BTreeMap<String, McpClient>,
}

impl McpTransport {
    /// Connect to every configured server; any failure aborts startup
    pub async fn connect(servers: &BTreeMap<String, McpServerConfig>) -> Result<Self> {
        let mut clients = BTreeMap::new();
        for (name, config) in servers {
            let client = McpClient::connect(name.clone(), config).await?;
            clients.insert(name.clone(), client);
        }
        Ok(Self { clients })
    }

    pub fn from_clients(clients: impl IntoIterator<Item = McpClient>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.name().to_string(), c)).collect(),
        }
    }

    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    /// Shut every server down
    pub async fn close(self) -> Result<()> {
        for (_, client) in self.clients {
            client.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ToolTransport for McpTransport {
    async fn list_tools(&self) -> Result<ToolCatalog> {
        let mut catalog = ToolCatalog::new();
        for (server, client) in &self.clients {
            let tools = client
                .list_tools()
                .await
                .with_context(|| format!("Failed to list tools of '{}'", server))?;
            tracing::debug!(server = %server, count = tools.len(), "Listed MCP tools");
            catalog.insert(
                server.clone(),
                tools.into_iter().map(|t| (t.name.clone(), t)).collect(),
            );
        }
        Ok(catalog)
    }

    async fn call_tool(&self, server: &str, tool: &str, arguments: Map<String, Value>) -> Result<String> {
        let client = self
            .clients
            .get(server)
            .ok_or_else(|| anyhow!("MCP server '{}' is not connected", server))?;
        client.call_tool(tool, arguments).await
    }

    fn server_instructions(&self, server: &str) -> Option<String> {
        self.clients.get(server)?.instructions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_from_wire() {
        let tool = tool_from_wire(json!({
            "name": "read_file",
            "description": "Read a file",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }
        }))
        .unwrap();

        assert_eq!(tool.name, "read_file");
        assert_eq!(tool.description, "Read a file");
        assert!(tool.parameters.is_required("path"));
    }

    #[test]
    fn test_tool_from_wire_unsupported_schema() {
        let tool = tool_from_wire(json!({
            "name": "odd",
            "inputSchema": { "type": ["string", "null"] }
        }))
        .unwrap();
        assert_eq!(tool.parameters, Property::object());
        assert!(tool_from_wire(json!({ "description": "no name" })).is_err());
    }

    #[test]
    fn test_result_text() {
        let (text, is_error) = result_text(json!({
            "content": [
                { "type": "text", "text": "line one" },
                { "type": "image", "data": "...", "mimeType": "image/png" },
                { "type": "text", "text": "line two" }
            ]
        }));
        assert_eq!(text, "line one\n[image content]\nline two");
        assert!(!is_error);

        let (text, is_error) = result_text(json!({
            "content": [{ "type": "text", "text": "boom" }],
            "isError": true
        }));
        assert_eq!(text, "boom");
        assert!(is_error);
    }
}
