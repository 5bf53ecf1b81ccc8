use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_agent::{Agent, AgentError, Result};
use arbor_llm::ModelClient;
use arbor_mcp::{McpServerConfig, McpTransport, ToolTransport};
use arbor_persist::{InMemoryRepository, MessageRepository};
use arbor_types::{AgentContext, AppConfig};

/// Everything a front end needs, wired once at startup
pub struct Runtime {
    pub context: Arc<AgentContext>,
    pub agent: Agent,
    transport: Option<Arc<McpTransport>>,
}

impl Runtime {
    /// Stop MCP server processes
    ///
    /// Servers still shared with a cloned [`Agent`] stop when the last
    /// clone is dropped.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let Self { agent, transport, .. } = self;
        drop(agent);
        if let Some(transport) = transport {
            if let Ok(transport) = Arc::try_unwrap(transport) {
                transport.close().await?;
            }
        }
        Ok(())
    }
}

/// Startup wiring for a runtime
///
/// Validates the configuration, selects the preset, spawns the MCP servers
/// its toolsets use and builds the agent.
pub struct Bootstrap {
    config: AppConfig,
    preset: Option<String>,
    model: Arc<dyn ModelClient>,
    repository: Option<Arc<dyn MessageRepository>>,
    transport: Option<Arc<dyn ToolTransport>>,
}

impl Bootstrap {
    pub fn new(config: AppConfig, model: Arc<dyn ModelClient>) -> Self {
        Self {
            config,
            preset: None,
            model,
            repository: None,
            transport: None,
        }
    }

    /// Use `name` instead of the configured default preset
    pub fn preset(mut self, name: impl Into<String>) -> Self {
        self.preset = Some(name.into());
        self
    }

    pub fn repository(mut self, repository: Arc<dyn MessageRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Replace the MCP child processes with another transport
    pub fn transport(mut self, transport: Arc<dyn ToolTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn start(self) -> Result<Runtime> {
        let context = Arc::new(AgentContext::new(self.config, self.preset.as_deref())?);

        let (transport, owned): (Arc<dyn ToolTransport>, Option<Arc<McpTransport>>) = match self.transport {
            Some(transport) => (transport, None),
            None => {
                let servers = servers_in_use(&context);
                let mcp = Arc::new(McpTransport::connect(&servers).await.map_err(AgentError::Transport)?);
                let shared: Arc<dyn ToolTransport> = mcp.clone();
                (shared, Some(mcp))
            }
        };

        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryRepository::new()));

        let agent = Agent::builder()
            .context(context.clone())
            .model(self.model)
            .transport(transport)
            .repository(repository)
            .build()
            .await?;

        Ok(Runtime {
            context,
            agent,
            transport: owned,
        })
    }
}

/// MCP servers referenced by the selected preset's toolsets
fn servers_in_use(context: &AgentContext) -> BTreeMap<String, McpServerConfig> {
    let configured = &context.config().mcp_servers;
    context
        .toolsets()
        .iter()
        .flat_map(|(_, toolset)| toolset.servers.keys())
        .filter_map(|name| configured.get(name).map(|server| (name.clone(), server.clone())))
        .collect()
}
