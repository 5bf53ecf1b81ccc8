use serde::{Deserialize, Serialize};

use crate::types::ToolCall;

/// Events produced by a model while it generates one assistant turn.
///
/// Provider failures are not an event variant: they arrive as `Err` items
/// of the [`ModelStream`](crate::ModelStream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelEvent {
    /// Response text (streamed token-by-token)
    Text {
        content: String,
    },

    /// Raw argument text for one tool call, streamed incrementally
    ToolArguments {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        chunk: String,
    },

    /// Terminal event carrying the final text and structured tool calls
    Completed {
        content: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
}

impl ModelEvent {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text { content: content.into() }
    }

    pub fn completed(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Completed {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
