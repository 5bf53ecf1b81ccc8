use arbor_mcp::{RegistryError, Toolset};
use regex::Regex;

use crate::config::{compile_pattern, AppConfig, Preset};
use crate::error::ConfigError;

/// A prompt ready to be considered for a system message
#[derive(Debug, Clone)]
pub struct ResolvedPrompt {
    pub name: String,
    pub content: String,
    /// Listed by the preset
    pub explicit: bool,
    pub always_include: bool,
    pub pattern: Option<Regex>,
}

impl ResolvedPrompt {
    /// Whether the pattern fires for `text`
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }
}

/// Startup context shared by every conversation of a process
///
/// Built once from validated configuration and handed to the agent by
/// `Arc`; nothing in it changes afterwards.
#[derive(Debug, Clone)]
pub struct AgentContext {
    config: AppConfig,
    preset_name: String,
    preset: Preset,
    prompts: Vec<ResolvedPrompt>,
    toolsets: Vec<(String, Toolset)>,
}

impl AgentContext {
    /// Validate `config` and select a preset
    ///
    /// Falls back to `agent.default_preset`, then to the only configured
    /// preset.
    pub fn new(config: AppConfig, preset: Option<&str>) -> Result<Self, ConfigError> {
        config.validate()?;

        let preset_name = match preset.map(str::to_string).or_else(|| config.agent.default_preset.clone()) {
            Some(name) => name,
            None if config.presets.len() == 1 => config.presets.keys().next().cloned().unwrap_or_default(),
            None => return Err(ConfigError::NoPresetSelected),
        };
        let preset = config.preset(&preset_name)?.clone();

        let mut prompts = Vec::new();
        // Explicit prompts first, in preset order
        for name in &preset.prompts {
            if let Some(prompt) = config.prompts.get(name) {
                prompts.push(ResolvedPrompt {
                    name: name.clone(),
                    content: prompt.content.clone(),
                    explicit: true,
                    always_include: prompt.always_include,
                    pattern: compile_pattern(name, prompt)?,
                });
            }
        }
        for (name, prompt) in &config.prompts {
            if preset.prompts.contains(name) {
                continue;
            }
            prompts.push(ResolvedPrompt {
                name: name.clone(),
                content: prompt.content.clone(),
                explicit: false,
                always_include: prompt.always_include,
                pattern: compile_pattern(name, prompt)?,
            });
        }

        let toolsets = preset
            .toolsets
            .iter()
            .map(|name| {
                config
                    .toolsets
                    .get(name)
                    .cloned()
                    .map(|t| (name.clone(), t))
                    .ok_or_else(|| RegistryError::UnknownToolset(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            preset = %preset_name,
            model = %preset.model,
            prompts = prompts.len(),
            toolsets = toolsets.len(),
            "Agent context ready"
        );

        Ok(Self {
            config,
            preset_name,
            preset,
            prompts,
            toolsets,
        })
    }

    /// Context with a single ad-hoc preset and nothing else configured
    pub fn from_preset(preset: Preset) -> Self {
        let mut config = AppConfig::default();
        config.presets.insert("default".to_string(), preset.clone());
        Self {
            config,
            preset_name: "default".to_string(),
            preset,
            prompts: Vec::new(),
            toolsets: Vec::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Explicit prompts in preset order, then every other prompt by name
    pub fn prompts(&self) -> &[ResolvedPrompt] {
        &self.prompts
    }

    /// Toolsets of the preset, in preset order
    pub fn toolsets(&self) -> &[(String, Toolset)] {
        &self.toolsets
    }

    pub fn max_iterations(&self) -> Option<usize> {
        self.config.agent.max_iterations
    }

    pub fn event_buffer(&self) -> usize {
        self.config.agent.event_buffer.max(1)
    }
}
