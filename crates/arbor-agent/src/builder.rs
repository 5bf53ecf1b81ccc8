use std::sync::Arc;

use arbor_llm::ModelClient;
use arbor_mcp::{StaticTransport, ToolRegistry, ToolTransport};
use arbor_persist::{InMemoryRepository, MessageRepository};
use arbor_types::AgentContext;

use crate::agent::Agent;
use crate::error::{AgentError, Result};

/// Builder for constructing an Agent with optional components
///
/// Without a repository the agent keeps conversations in memory; without a
/// transport it offers no tools.
pub struct AgentBuilder {
    context: Option<Arc<AgentContext>>,
    model: Option<Arc<dyn ModelClient>>,
    transport: Option<Arc<dyn ToolTransport>>,
    repository: Option<Arc<dyn MessageRepository>>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            context: None,
            model: None,
            transport: None,
            repository: None,
        }
    }

    /// Set the startup context (preset, prompts, toolsets)
    pub fn context(mut self, context: Arc<AgentContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the model client
    pub fn model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the tool transport
    pub fn transport(mut self, transport: Arc<dyn ToolTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the message repository
    pub fn repository(mut self, repository: Arc<dyn MessageRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Build the Agent
    ///
    /// Lists the transport's tools once and resolves them against the
    /// context's toolsets; configuration mistakes surface here, before any
    /// conversation starts.
    pub async fn build(self) -> Result<Agent> {
        let context = self.context.ok_or(AgentError::MissingComponent("Agent context"))?;
        let model = self.model.ok_or(AgentError::MissingComponent("Model client"))?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(StaticTransport::new()));
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryRepository::new()));

        let registry = if context.toolsets().is_empty() {
            ToolRegistry::empty()
        } else {
            let catalog = transport.list_tools().await.map_err(AgentError::Transport)?;
            ToolRegistry::resolve(&catalog, context.toolsets().iter().map(|(_, toolset)| toolset))?
        };

        tracing::info!(
            preset = %context.preset_name(),
            tools = registry.len(),
            "Agent ready"
        );

        Ok(Agent::from_parts(context, model, transport, repository, Arc::new(registry)))
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
