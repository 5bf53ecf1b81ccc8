use arbor_mcp::{check_server_name, check_tool_name, McpServerConfig, RegistryError, Toolset};
use config::{Config as ConfigLoader, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// Default capacity of a dispatch's event channel
pub const DEFAULT_EVENT_BUFFER: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,

    #[serde(default)]
    pub prompts: BTreeMap<String, PromptConfig>,

    #[serde(default)]
    pub toolsets: BTreeMap<String, Toolset>,

    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub default_preset: Option<String>,

    /// Bound on model turns per dispatch; unbounded when absent
    #[serde(default)]
    pub max_iterations: Option<usize>,

    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_preset: None,
            max_iterations: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Model choice plus the prompts and toolsets that go with it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub model: String,

    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Named prompts always included for this preset
    #[serde(default)]
    pub prompts: Vec<String>,

    #[serde(default)]
    pub toolsets: Vec<String>,
}

impl Preset {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    pub fn with_prompt(mut self, name: impl Into<String>) -> Self {
        self.prompts.push(name.into());
        self
    }

    pub fn with_toolset(mut self, name: impl Into<String>) -> Self {
        self.toolsets.push(name.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub content: String,

    #[serde(default)]
    pub always_include: bool,

    /// Regular expression; the prompt is included when it matches the
    /// conversation text
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl AppConfig {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ARBOR_ENV}.toml (if ARBOR_ENV is set, `dev` otherwise)
    /// 3. Environment variables (`ARBOR_AGENT__MAX_ITERATIONS=10`)
    ///
    /// A `.env` file in the working directory is loaded first.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Same as [`AppConfig::load`] with an explicit config directory
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        let dir = dir.as_ref();
        let env = std::env::var("ARBOR_ENV").unwrap_or_else(|_| "dev".to_string());

        let config = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&dir.join(&env).to_string_lossy()).required(false))
            // 3. Environment variables override everything
            .add_source(
                Environment::with_prefix("ARBOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = config.try_deserialize()?;
        tracing::debug!(env = %env, presets = cfg.presets.len(), "Loaded configuration");
        Ok(cfg)
    }

    /// Parse a single TOML document (useful for testing)
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Check cross references between sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(default) = &self.agent.default_preset {
            if !self.presets.contains_key(default) {
                return Err(ConfigError::UnknownPreset(default.clone()));
            }
        }

        for (name, preset) in &self.presets {
            for prompt in &preset.prompts {
                if !self.prompts.contains_key(prompt) {
                    return Err(ConfigError::UnknownPrompt {
                        preset: name.clone(),
                        prompt: prompt.clone(),
                    });
                }
            }
            for toolset in &preset.toolsets {
                if !self.toolsets.contains_key(toolset) {
                    return Err(RegistryError::UnknownToolset(toolset.clone()).into());
                }
            }
        }

        for (name, prompt) in &self.prompts {
            compile_pattern(name, prompt)?;
        }

        for toolset in self.toolsets.values() {
            for (server, policy) in &toolset.servers {
                check_server_name(server)?;
                for tool in policy.tools.iter().flat_map(|tools| tools.keys()) {
                    check_tool_name(tool)?;
                }
            }
        }
        for server in self.mcp_servers.keys() {
            check_server_name(server)?;
        }

        Ok(())
    }

    pub fn preset(&self, name: &str) -> Result<&Preset, ConfigError> {
        self.presets
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))
    }
}

pub(crate) fn compile_pattern(name: &str, prompt: &PromptConfig) -> Result<Option<Regex>, ConfigError> {
    prompt
        .pattern
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                prompt: name.to_string(),
                source,
            })
        })
        .transpose()
}
