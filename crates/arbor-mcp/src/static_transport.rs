use anyhow::{anyhow, Result};
use arbor_llm::Tool;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::transport::{ToolCatalog, ToolTransport};

type Responder = Arc<dyn Fn(&Map<String, Value>) -> Result<String> + Send + Sync>;

/// A recorded invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub server: String,
    pub tool: String,
    pub arguments: Map<String, Value>,
}

/// In-process transport with fixed tools and canned answers
///
/// Unconfigured tools echo their arguments. Every call is recorded so
/// tests can assert on what actually reached the transport.
#[derive(Clone, Default)]
pub struct StaticTransport {
    catalog: ToolCatalog,
    responders: BTreeMap<(String, String), Responder>,
    delays: BTreeMap<(String, String), Duration>,
    instructions: BTreeMap<String, String>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, server: impl Into<String>, tool: Tool) -> Self {
        self.catalog
            .entry(server.into())
            .or_default()
            .insert(tool.name.clone(), tool);
        self
    }

    /// Answer calls to `server`/`tool` with `respond`
    pub fn with_response<F>(mut self, server: &str, tool: &str, respond: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<String> + Send + Sync + 'static,
    {
        self.responders
            .insert((server.to_string(), tool.to_string()), Arc::new(respond));
        self
    }

    /// Fail every call to `server`/`tool` with `message`
    pub fn with_failure(self, server: &str, tool: &str, message: &str) -> Self {
        let message = message.to_string();
        self.with_response(server, tool, move |_| Err(anyhow!(message.clone())))
    }

    /// Sleep before answering calls to `server`/`tool`
    pub fn with_delay(mut self, server: &str, tool: &str, delay: Duration) -> Self {
        self.delays.insert((server.to_string(), tool.to_string()), delay);
        self
    }

    pub fn with_instructions(mut self, server: impl Into<String>, text: impl Into<String>) -> Self {
        self.instructions.insert(server.into(), text.into());
        self
    }

    /// Calls that reached the transport, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolTransport for StaticTransport {
    async fn list_tools(&self) -> Result<ToolCatalog> {
        Ok(self.catalog.clone())
    }

    async fn call_tool(&self, server: &str, tool: &str, arguments: Map<String, Value>) -> Result<String> {
        let key = (server.to_string(), tool.to_string());
        if !self.catalog.get(server).is_some_and(|tools| tools.contains_key(tool)) {
            return Err(anyhow!("Unknown tool {}/{}", server, tool));
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                server: server.to_string(),
                tool: tool.to_string(),
                arguments: arguments.clone(),
            });
        }

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        match self.responders.get(&key) {
            Some(respond) => respond(&arguments),
            None => Ok(Value::Object(arguments).to_string()),
        }
    }

    fn server_instructions(&self, server: &str) -> Option<String> {
        self.instructions.get(server).cloned()
    }
}
