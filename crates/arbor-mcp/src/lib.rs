//! Tool side of the agent runtime.
//!
//! [`ToolTransport`] is the contract for listing and invoking tools on named
//! servers; [`McpTransport`] implements it over MCP child processes.
//! [`ToolRegistry`] narrows a transport's catalog to what a conversation's
//! toolsets allow, and carries approval flags and preset parameters.

pub mod client;
pub mod registry;
pub mod static_transport;
pub mod toolset;
pub mod transport;
pub mod validate;

pub use client::{McpClient, McpServerConfig, McpTransport};
pub use registry::{
    check_server_name, check_tool_name, qualify, split_qualified, RegistryError, ToolRegistry, ToolWithApproval,
    TOOL_NAME_SEPARATOR,
};
pub use static_transport::{RecordedCall, StaticTransport};
pub use toolset::{ServerPolicy, ToolPolicy, Toolset};
pub use transport::{ToolCatalog, ToolTransport};
pub use validate::{validate_arguments, ValidationError};
