use arbor_mcp::RegistryError;
use thiserror::Error;

/// Configuration problems, all raised before any conversation starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("No preset selected and no default preset configured")]
    NoPresetSelected,

    #[error("Preset '{preset}' references unknown prompt '{prompt}'")]
    UnknownPrompt { preset: String, prompt: String },

    #[error("Prompt '{prompt}' has an invalid pattern: {source}")]
    InvalidPattern {
        prompt: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
