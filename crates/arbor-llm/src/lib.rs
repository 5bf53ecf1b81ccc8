pub mod types;
pub mod traits;
pub mod streaming;
pub mod incremental_json;
pub mod scripted;

pub use traits::{GenerateRequest, ModelClient, ModelStream};
pub use streaming::ModelEvent;
pub use incremental_json::{ArgumentUpdate, IncrementalJsonParser, ParseError};
pub use scripted::{ScriptedModel, ScriptedTurn};
pub use types::{ChatMessage, ParamType, Property, Tool, ToolCall};
