//! # Arbor
//!
//! Agent runtime for branching conversations with approval-gated tools.
//!
//! ## Overview
//!
//! - **Branching history**: every conversation is a tree of immutable
//!   messages; any message can be replayed, edited or forked
//! - **Tool calls** over MCP servers, narrowed per preset by toolsets with
//!   allow-lists, approval flags and preset parameters
//! - **Streaming**: text and partial tool arguments reach the caller while
//!   the model is still writing them
//! - **Approval gate**: turns that need approval suspend and resume with a
//!   later dispatch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arbor::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     init_logging(&config.logging);
//!
//!     let model = Arc::new(ScriptedModel::new([ScriptedTurn::text("Hello!")]));
//!     let runtime = Bootstrap::new(config, model).start().await?;
//!
//!     let repository = runtime.agent.repository().clone();
//!     let thread = repository.create_thread(None).await?;
//!     let turn = NewMessage::human(thread.id, None, "Hi");
//!
//!     let (mut events, handle) = runtime.agent.spawn_dispatch(turn, CancellationToken::new());
//!     while let Some(event) = events.recv().await {
//!         if let AgentEvent::TextChunk { content } = event {
//!             print!("{}", content);
//!         }
//!     }
//!     handle.await??;
//!
//!     runtime.shutdown().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`arbor-llm`**: model contract, tool schemas, incremental JSON parser
//! - **`arbor-persist`**: threads, messages and branch reconstruction
//! - **`arbor-mcp`**: MCP transport, toolsets and the tool registry
//! - **`arbor-types`**: configuration, startup context and events
//! - **`arbor-agent`**: the orchestration loop

pub mod bootstrap;
pub mod prelude;
pub mod telemetry;

pub use bootstrap::{Bootstrap, Runtime};
pub use telemetry::init_logging;

pub use arbor_agent::{
    execute_all, render_report, system_message, Agent, AgentBuilder, AgentError, Completion, StreamForwarder,
    ToolOutcome, Turn, TurnOutcome,
};

pub use arbor_llm::{
    ArgumentUpdate, ChatMessage, GenerateRequest, IncrementalJsonParser, ModelClient, ModelEvent, ModelStream,
    ParamType, ParseError, Property, ScriptedModel, ScriptedTurn, Tool, ToolCall,
};

pub use arbor_mcp::{
    McpClient, McpServerConfig, McpTransport, RegistryError, ServerPolicy, StaticTransport, ToolCatalog,
    ToolPolicy, ToolRegistry, ToolTransport, ToolWithApproval, Toolset, ValidationError,
};

pub use arbor_persist::{InMemoryRepository, Message, MessageRepository, NewMessage, PersistError, Role, Thread};

#[cfg(feature = "mongodb")]
pub use arbor_persist::MongoRepository;

pub use arbor_types::{
    AgentContext, AgentEvent, AppConfig, ConfigError, EventSender, LogFormat, LoggingConfig, Preset, PromptConfig,
};

pub use tokio_util::sync::CancellationToken;
