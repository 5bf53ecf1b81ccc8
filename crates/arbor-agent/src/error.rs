use arbor_mcp::RegistryError;
use arbor_persist::{PersistError, Role};
use arbor_types::ConfigError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Model error: {0:#}")]
    Model(anyhow::Error),

    #[error("Tool transport error: {0:#}")]
    Transport(anyhow::Error),

    #[error("Dispatch cancelled")]
    Cancelled,

    #[error("Event receiver dropped")]
    EventChannelClosed,

    #[error("Cannot dispatch a {0} message")]
    UnsupportedRole(Role),

    #[error("Tool calls of message {0} already have a result")]
    AlreadyResolved(Uuid),

    #[error("Stopped after {0} model turns")]
    MaxIterations(usize),

    #[error("{0} is required")]
    MissingComponent(&'static str),
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<RegistryError> for AgentError {
    fn from(err: RegistryError) -> Self {
        Self::Config(ConfigError::Registry(err))
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
