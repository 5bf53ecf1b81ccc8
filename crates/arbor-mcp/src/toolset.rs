use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Named selection of tools a conversation may use
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Toolset {
    /// Extra system text while this toolset is active
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Server name -> policy
    #[serde(default)]
    pub servers: BTreeMap<String, ServerPolicy>,
}

/// Which tools of one server are allowed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerPolicy {
    /// Approval default for the server's tools
    #[serde(default)]
    pub require_approval: bool,

    /// Explicit allow-list; `None` allows every tool of the server
    #[serde(default)]
    pub tools: Option<BTreeMap<String, ToolPolicy>>,
}

/// Per-tool overrides inside an allow-list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicy {
    #[serde(default)]
    pub require_approval: Option<bool>,

    /// Values pinned out of the model's control
    #[serde(default)]
    pub preset_parameters: Map<String, Value>,
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    pub fn with_server(mut self, server: impl Into<String>, policy: ServerPolicy) -> Self {
        self.servers.insert(server.into(), policy);
        self
    }
}

impl ServerPolicy {
    /// Every tool of the server
    pub fn all(require_approval: bool) -> Self {
        Self {
            require_approval,
            tools: None,
        }
    }

    /// Only the listed tools
    pub fn only(require_approval: bool) -> Self {
        Self {
            require_approval,
            tools: Some(BTreeMap::new()),
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>, policy: ToolPolicy) -> Self {
        self.tools.get_or_insert_with(BTreeMap::new).insert(tool.into(), policy);
        self
    }
}

impl ToolPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_approval(mut self, require: bool) -> Self {
        self.require_approval = Some(require);
        self
    }

    pub fn with_preset(mut self, name: impl Into<String>, value: Value) -> Self {
        self.preset_parameters.insert(name.into(), value);
        self
    }
}
