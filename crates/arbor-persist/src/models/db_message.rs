use arbor_llm::{ChatMessage, ToolCall};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
    Tool,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted, immutable node of a conversation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    /// Earlier message of the same thread, `None` for a root
    pub parent_id: Option<Uuid>,
    pub role: Role,
    pub content: String,
    /// Only set on assistant messages that requested tools
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub model_name: Option<String>,
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Assistant message that asked for at least one tool
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Child-to-be of this message with the same thread
    pub fn reply(&self, role: Role, content: impl Into<String>) -> NewMessage {
        NewMessage::new(self.thread_id, Some(self.id), role, content)
    }
}

/// Message that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    /// Identity to use; the repository assigns one when absent
    pub id: Option<Uuid>,
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub model_name: Option<String>,
    pub provider: Option<String>,
}

impl NewMessage {
    pub fn new(thread_id: Uuid, parent_id: Option<Uuid>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            thread_id,
            parent_id,
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            model_name: None,
            provider: None,
        }
    }

    pub fn human(thread_id: Uuid, parent_id: Option<Uuid>, content: impl Into<String>) -> Self {
        Self::new(thread_id, parent_id, Role::Human, content)
    }

    pub fn system(thread_id: Uuid, parent_id: Option<Uuid>, content: impl Into<String>) -> Self {
        Self::new(thread_id, parent_id, Role::System, content)
    }

    pub fn tool(thread_id: Uuid, parent_id: Option<Uuid>, content: impl Into<String>) -> Self {
        Self::new(thread_id, parent_id, Role::Tool, content)
    }

    pub fn assistant(
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            tool_calls,
            ..Self::new(thread_id, parent_id, Role::Assistant, content)
        }
    }

    /// Tool-role answer that declines every call of a pending assistant message
    pub fn rejection(assistant: &Message, reason: Option<&str>) -> Self {
        let mut content = String::new();
        for call in &assistant.tool_calls {
            content.push_str(&format!(
                "Tool call {} ({}) was rejected by the user.\n",
                call.name, call.id
            ));
        }
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            content.push_str(&format!("Reason: {}\n", reason.trim()));
        }
        Self::tool(assistant.thread_id, Some(assistant.id), content.trim_end())
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_provenance(mut self, model_name: impl Into<String>, provider: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self.provider = Some(provider.into());
        self
    }

    /// Materialize with the identity and timestamp chosen by a store
    pub fn into_message(self, id: Uuid, created_at: DateTime<Utc>) -> Message {
        Message {
            id,
            thread_id: self.thread_id,
            parent_id: self.parent_id,
            role: self.role,
            content: self.content,
            tool_calls: self.tool_calls,
            model_name: self.model_name,
            provider: self.provider,
            created_at,
        }
    }
}

// Conversion: Message → arbor_llm::ChatMessage
impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        match msg.role {
            Role::Human => ChatMessage::human(msg.content.clone()),
            Role::System => ChatMessage::system(msg.content.clone()),
            Role::Tool => ChatMessage::tool(msg.content.clone()),
            Role::Assistant => {
                let content = (!msg.content.is_empty()).then(|| msg.content.clone());
                ChatMessage::ai_with_tools(content, msg.tool_calls.clone())
            }
        }
    }
}
