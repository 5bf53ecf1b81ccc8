use anyhow::Result;
use arbor_llm::Tool;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw tool catalog: server name -> tool name -> definition
pub type ToolCatalog = BTreeMap<String, BTreeMap<String, Tool>>;

/// Executes tools that live on named servers
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Every tool of every connected server, keyed by unqualified names
    async fn list_tools(&self) -> Result<ToolCatalog>;

    /// Invoke one tool and return its textual result
    ///
    /// Errors cover both transport failures and tool-reported errors.
    async fn call_tool(&self, server: &str, tool: &str, arguments: Map<String, Value>) -> Result<String>;

    /// Usage instructions a server advertised about itself
    fn server_instructions(&self, _server: &str) -> Option<String> {
        None
    }
}
