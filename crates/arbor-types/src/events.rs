use arbor_llm::{ParamType, ToolCall};
use arbor_persist::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Sending half of a dispatch's event stream
pub type EventSender = mpsc::Sender<AgentEvent>;

/// Everything a caller observes while a dispatch runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A message was persisted
    NewMessage { message: Message },

    /// Assistant text (streamed token-by-token)
    TextChunk { content: String },

    /// New literal content for one path of a tool call's arguments
    ToolArgumentChunk {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        path: String,
        chunk: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        declared_type: Option<ParamType>,
    },

    /// The turn is suspended until the caller approves or rejects `calls`
    ToolApprovalRequested { message: Message, calls: Vec<ToolCall> },

    /// One tool call finished
    ToolResult {
        call_id: String,
        name: String,
        output: String,
        is_error: bool,
        duration_ms: u64,
    },

    /// Terminal failure of the dispatch, or of one call's argument stream
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
}

impl AgentEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            call_id: None,
        }
    }
}
