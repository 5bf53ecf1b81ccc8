//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust
//! use arbor::prelude::*;
//! ```

pub use crate::{
    init_logging, Agent, AgentBuilder, AgentContext, AgentError, AgentEvent, AppConfig, Bootstrap,
    CancellationToken, InMemoryRepository, Message, MessageRepository, ModelClient, NewMessage, Role, Runtime,
    ScriptedModel, ScriptedTurn, StaticTransport, Thread, Tool, ToolCall, ToolTransport, Toolset, Turn,
    TurnOutcome,
};
