use arbor_llm::ToolCall;
use arbor_persist::{Message, NewMessage};

/// Input of one dispatch
#[derive(Debug, Clone)]
pub enum Turn {
    /// Not stored yet: a fresh user input or a rejection notice
    New(NewMessage),

    /// Already stored. Human and tool messages are answered by the model;
    /// an assistant message with tool calls means its calls were approved.
    Existing(Message),
}

impl From<NewMessage> for Turn {
    fn from(message: NewMessage) -> Self {
        Self::New(message)
    }
}

impl From<Message> for Turn {
    fn from(message: Message) -> Self {
        Self::Existing(message)
    }
}

/// How a dispatch ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model answered without requesting tools
    Completed(Message),

    /// Suspended until the caller approves (dispatch `message` again) or
    /// rejects (dispatch a rejection built from it)
    NeedsApproval { message: Message, calls: Vec<ToolCall> },

    /// The model stream ended without a completion; carries the newest
    /// stored message of the branch
    NoResponse(Message),
}

impl TurnOutcome {
    /// Newest message of the branch after the dispatch
    pub fn message(&self) -> &Message {
        match self {
            Self::Completed(message) | Self::NoResponse(message) => message,
            Self::NeedsApproval { message, .. } => message,
        }
    }

    pub fn needs_approval(&self) -> bool {
        matches!(self, Self::NeedsApproval { .. })
    }
}
