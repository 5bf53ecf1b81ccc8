pub mod agent;
pub mod builder;
pub mod error;
pub mod executor;
pub mod prompt;
pub mod stream;
pub mod turn;

pub use agent::Agent;
pub use builder::AgentBuilder;
pub use error::{AgentError, Result};
pub use executor::{execute_all, render_report, ToolOutcome};
pub use prompt::system_message;
pub use stream::{Completion, StreamForwarder};
pub use turn::{Turn, TurnOutcome};

// Re-export key types from arbor-types
pub use arbor_types::{AgentContext, AgentEvent, EventSender};
