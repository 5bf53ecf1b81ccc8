use crate::streaming::ModelEvent;
use crate::types::{ChatMessage, Tool};
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelEvent>> + Send>>;

/// Model generation capability, independent of which vendor API backs it.
///
/// Dropping the returned stream cancels the generation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelStream>;
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub history: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            system: String::new(),
            history,
            tools: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }
}
