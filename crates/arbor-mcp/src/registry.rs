use arbor_llm::{Property, Tool};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::toolset::Toolset;
use crate::transport::ToolCatalog;
use crate::validate::{json_type, validate_arguments, ValidationError};

/// Separator between server and tool in a qualified tool name
pub const TOOL_NAME_SEPARATOR: &str = "__";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown MCP server '{0}'")]
    UnknownServer(String),

    #[error("Unknown tool '{tool}' on server '{server}'")]
    UnknownTool { server: String, tool: String },

    #[error("Preset parameter '{parameter}' is not a parameter of {server}__{tool}")]
    UnknownPresetParameter {
        server: String,
        tool: String,
        parameter: String,
    },

    #[error("Name '{0}' must not contain '__'")]
    InvalidName(String),

    #[error("Server name '{0}' must not end with '_'")]
    TrailingUnderscore(String),

    #[error("Unknown toolset '{0}'")]
    UnknownToolset(String),
}

/// `server__tool`
pub fn qualify(server: &str, tool: &str) -> String {
    format!("{}{}{}", server, TOOL_NAME_SEPARATOR, tool)
}

/// Inverse of [`qualify`]
///
/// Splits at the first `__`, which is unambiguous for server names that
/// pass [`check_server_name`].
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once(TOOL_NAME_SEPARATOR)
        .filter(|(server, tool)| !server.is_empty() && !tool.is_empty())
}

/// A tool as a conversation is allowed to use it
#[derive(Debug, Clone, PartialEq)]
pub struct ToolWithApproval {
    /// Definition shown to the model, preset parameters stripped
    pub tool: Tool,
    pub require_approval: bool,
    pub preset_parameters: Map<String, Value>,
    original_parameters: Property,
}

impl ToolWithApproval {
    pub fn new(tool: Tool, require_approval: bool, preset_parameters: Map<String, Value>) -> Self {
        let original_parameters = tool.parameters.clone();
        let parameters = strip_presets(&original_parameters, &preset_parameters);
        Self {
            tool: Tool { parameters, ..tool },
            require_approval,
            preset_parameters,
            original_parameters,
        }
    }

    /// Schema as declared by the server
    pub fn original_parameters(&self) -> &Property {
        &self.original_parameters
    }

    /// Parameter names hidden from the model, recovered from the schema diff
    pub fn preset_names(&self) -> Vec<&str> {
        self.original_parameters
            .properties
            .keys()
            .filter(|name| !self.tool.parameters.properties.contains_key(*name))
            .map(String::as_str)
            .collect()
    }

    /// Combine model arguments with presets and validate the result
    ///
    /// Presets always win over model-supplied values of the same name.
    pub fn merge_arguments(&self, model_arguments: &Value) -> Result<Map<String, Value>, ValidationError> {
        let mut merged = match model_arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(ValidationError::NotAnObject {
                    found: json_type(other).to_string(),
                })
            }
        };

        for name in self.preset_names() {
            if let Some(value) = self.preset_parameters.get(name) {
                merged.insert(name.to_string(), value.clone());
            }
        }

        validate_arguments(&self.original_parameters, &Value::Object(merged.clone()))?;
        Ok(merged)
    }

    fn absorb(&mut self, require_approval: bool, presets: &Map<String, Value>) {
        self.require_approval |= require_approval;
        if !presets.is_empty() {
            self.preset_parameters.extend(presets.clone());
            self.tool.parameters = strip_presets(&self.original_parameters, &self.preset_parameters);
        }
    }
}

fn strip_presets(schema: &Property, presets: &Map<String, Value>) -> Property {
    let mut visible = schema.clone();
    for name in presets.keys() {
        visible.properties.remove(name);
        visible.required.retain(|r| r != name);
    }
    visible
}

/// Tools a conversation may use, resolved once from the raw catalog and
/// the active toolsets. Read-only after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    servers: BTreeMap<String, BTreeMap<String, ToolWithApproval>>,
}

impl ToolRegistry {
    /// Empty registry: the model sees no tools
    pub fn empty() -> Self {
        Self::default()
    }

    /// Restrict `catalog` to what `toolsets` allow
    ///
    /// With several toolsets, a tool requires approval if any of them says
    /// so, and preset parameters of later toolsets override earlier ones.
    pub fn resolve<'a>(
        catalog: &ToolCatalog,
        toolsets: impl IntoIterator<Item = &'a Toolset>,
    ) -> Result<Self, RegistryError> {
        let mut servers: BTreeMap<String, BTreeMap<String, ToolWithApproval>> = BTreeMap::new();

        for toolset in toolsets {
            for (server, policy) in &toolset.servers {
                check_server_name(server)?;
                let available = catalog
                    .get(server)
                    .ok_or_else(|| RegistryError::UnknownServer(server.clone()))?;
                let resolved = servers.entry(server.clone()).or_default();

                match &policy.tools {
                    None => {
                        for (name, tool) in available {
                            check_tool_name(name)?;
                            include(resolved, server, name, tool, policy.require_approval, &Map::new());
                        }
                    }
                    Some(allowed) => {
                        for (name, tool_policy) in allowed {
                            check_tool_name(name)?;
                            let tool = available.get(name).ok_or_else(|| RegistryError::UnknownTool {
                                server: server.clone(),
                                tool: name.clone(),
                            })?;
                            if let Some(parameter) = tool_policy
                                .preset_parameters
                                .keys()
                                .find(|p| !tool.parameters.properties.contains_key(*p))
                            {
                                return Err(RegistryError::UnknownPresetParameter {
                                    server: server.clone(),
                                    tool: name.clone(),
                                    parameter: parameter.clone(),
                                });
                            }
                            let approval = tool_policy.require_approval.unwrap_or(policy.require_approval);
                            include(resolved, server, name, tool, approval, &tool_policy.preset_parameters);
                        }
                    }
                }
            }
        }

        servers.retain(|_, tools| !tools.is_empty());
        let registry = Self { servers };
        tracing::debug!(servers = registry.servers.len(), tools = registry.len(), "Resolved tool registry");
        Ok(registry)
    }

    pub fn get(&self, server: &str, tool: &str) -> Option<&ToolWithApproval> {
        self.servers.get(server)?.get(tool)
    }

    /// Look up by `server__tool`
    pub fn get_qualified(&self, name: &str) -> Option<&ToolWithApproval> {
        let (server, tool) = split_qualified(name)?;
        self.get(server, tool)
    }

    /// Flattened catalog for the model, named `server__tool`
    pub fn tools(&self) -> Vec<Tool> {
        self.servers
            .iter()
            .flat_map(|(server, tools)| {
                tools
                    .iter()
                    .map(move |(name, entry)| entry.tool.renamed(qualify(server, name)))
            })
            .collect()
    }

    /// Servers with at least one tool in scope
    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    pub fn server_tools(&self, server: &str) -> Option<&BTreeMap<String, ToolWithApproval>> {
        self.servers.get(server)
    }

    /// Unknown names never require approval; they fail at execution
    pub fn requires_approval(&self, qualified: &str) -> bool {
        self.get_qualified(qualified).is_some_and(|t| t.require_approval)
    }

    pub fn len(&self) -> usize {
        self.servers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// A server name must survive the round trip through [`qualify`] and
/// [`split_qualified`]: `fs_` would qualify `read` as `fs___read`.
pub fn check_server_name(name: &str) -> Result<(), RegistryError> {
    check_tool_name(name)?;
    if name.ends_with('_') {
        return Err(RegistryError::TrailingUnderscore(name.to_string()));
    }
    Ok(())
}

pub fn check_tool_name(name: &str) -> Result<(), RegistryError> {
    if name.contains(TOOL_NAME_SEPARATOR) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn include(
    resolved: &mut BTreeMap<String, ToolWithApproval>,
    server: &str,
    name: &str,
    tool: &Tool,
    require_approval: bool,
    presets: &Map<String, Value>,
) {
    match resolved.get_mut(name) {
        Some(existing) => existing.absorb(require_approval, presets),
        None => {
            tracing::trace!(server = %server, tool = %name, require_approval, "Tool in scope");
            resolved.insert(
                name.to_string(),
                ToolWithApproval::new(tool.clone(), require_approval, presets.clone()),
            );
        }
    }
}
