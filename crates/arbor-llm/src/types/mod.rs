pub mod message;
pub mod tool;

pub use message::ChatMessage;
pub use tool::{ParamType, Property, Tool, ToolCall};
