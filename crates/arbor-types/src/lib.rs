pub mod config;
pub mod context;
pub mod error;
pub mod events;

pub use config::{AgentSettings, AppConfig, LogFormat, LoggingConfig, Preset, PromptConfig};
pub use context::{AgentContext, ResolvedPrompt};
pub use error::ConfigError;
pub use events::{AgentEvent, EventSender};
