use arbor_llm::{Property, Tool};
use arbor_mcp::{
    qualify, split_qualified, RegistryError, ServerPolicy, StaticTransport, ToolPolicy, ToolRegistry, ToolTransport,
    Toolset, ValidationError,
};
use serde_json::json;

fn read_file() -> Tool {
    Tool::new(
        "read_file",
        "Read a file",
        Property::object()
            .with_property("path", Property::string(), true)
            .with_property("encoding", Property::string(), false),
    )
}

fn write_file() -> Tool {
    Tool::new(
        "write_file",
        "Write a file",
        Property::object()
            .with_property("path", Property::string(), true)
            .with_property("content", Property::string(), true),
    )
}

fn search() -> Tool {
    Tool::new(
        "search",
        "Search the web",
        Property::object().with_property("query", Property::string(), true),
    )
}

fn transport() -> StaticTransport {
    StaticTransport::new()
        .with_tool("fs", read_file())
        .with_tool("fs", write_file())
        .with_tool("web", search())
}

#[tokio::test]
async fn test_all_tools_with_server_default() {
    let catalog = transport().list_tools().await.unwrap();
    let toolset = Toolset::new().with_server("fs", ServerPolicy::all(true));

    let registry = ToolRegistry::resolve(&catalog, [&toolset]).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(registry.requires_approval("fs__read_file"));
    assert!(registry.requires_approval("fs__write_file"));
    assert!(registry.get("web", "search").is_none());
    assert_eq!(registry.servers().collect::<Vec<_>>(), vec!["fs"]);
}

#[tokio::test]
async fn test_allow_list_with_override() {
    let catalog = transport().list_tools().await.unwrap();
    let toolset = Toolset::new().with_server(
        "fs",
        ServerPolicy::only(true).with_tool("read_file", ToolPolicy::new().require_approval(false)),
    );

    let registry = ToolRegistry::resolve(&catalog, [&toolset]).unwrap();

    assert_eq!(registry.len(), 1);
    assert!(!registry.requires_approval("fs__read_file"));
    assert!(registry.get("fs", "write_file").is_none());
}

#[tokio::test]
async fn test_flattened_names_are_qualified() {
    let catalog = transport().list_tools().await.unwrap();
    let toolset = Toolset::new()
        .with_server("fs", ServerPolicy::all(false))
        .with_server("web", ServerPolicy::all(false));

    let registry = ToolRegistry::resolve(&catalog, [&toolset]).unwrap();
    let names: Vec<String> = registry.tools().into_iter().map(|t| t.name).collect();

    assert_eq!(names, vec!["fs__read_file", "fs__write_file", "web__search"]);
    assert_eq!(split_qualified("fs__read_file"), Some(("fs", "read_file")));
    assert_eq!(qualify("web", "search"), "web__search");
    assert_eq!(split_qualified("no_separator"), None);
}

#[tokio::test]
async fn test_unknown_server_and_tool() {
    let catalog = transport().list_tools().await.unwrap();

    let toolset = Toolset::new().with_server("db", ServerPolicy::all(false));
    let err = ToolRegistry::resolve(&catalog, [&toolset]).unwrap_err();
    assert_eq!(err, RegistryError::UnknownServer("db".into()));

    let toolset = Toolset::new().with_server("fs", ServerPolicy::only(false).with_tool("delete", ToolPolicy::new()));
    let err = ToolRegistry::resolve(&catalog, [&toolset]).unwrap_err();
    assert_eq!(
        err,
        RegistryError::UnknownTool {
            server: "fs".into(),
            tool: "delete".into()
        }
    );
}

#[tokio::test]
async fn test_invalid_names() {
    let transport = StaticTransport::new().with_tool("my__fs", read_file());
    let catalog = transport.list_tools().await.unwrap();

    let toolset = Toolset::new().with_server("my__fs", ServerPolicy::all(false));
    let err = ToolRegistry::resolve(&catalog, [&toolset]).unwrap_err();
    assert_eq!(err, RegistryError::InvalidName("my__fs".into()));
}

#[tokio::test]
async fn test_server_name_with_trailing_underscore() {
    let transport = StaticTransport::new().with_tool("fs_", read_file());
    let catalog = transport.list_tools().await.unwrap();

    let toolset = Toolset::new().with_server("fs_", ServerPolicy::all(true));
    let err = ToolRegistry::resolve(&catalog, [&toolset]).unwrap_err();
    assert_eq!(err, RegistryError::TrailingUnderscore("fs_".into()));
}

#[tokio::test]
async fn test_tool_name_with_leading_underscore_round_trips() {
    let tool = Tool::new("_read", "Read a file", Property::object());
    let transport = StaticTransport::new().with_tool("fs", tool);
    let catalog = transport.list_tools().await.unwrap();

    let toolset = Toolset::new().with_server("fs", ServerPolicy::all(true));
    let registry = ToolRegistry::resolve(&catalog, [&toolset]).unwrap();

    let qualified = qualify("fs", "_read");
    assert_eq!(qualified, "fs___read");
    assert_eq!(split_qualified(&qualified), Some(("fs", "_read")));
    assert!(registry.get_qualified(&qualified).is_some());
    assert!(registry.requires_approval(&qualified));
}

#[tokio::test]
async fn test_preset_parameters_hidden_and_injected() {
    let catalog = transport().list_tools().await.unwrap();
    let toolset = Toolset::new().with_server(
        "fs",
        ServerPolicy::only(false).with_tool("read_file", ToolPolicy::new().with_preset("path", json!("/etc/passwd"))),
    );

    let registry = ToolRegistry::resolve(&catalog, [&toolset]).unwrap();
    let entry = registry.get("fs", "read_file").unwrap();

    // Hidden from the model
    assert!(!entry.tool.parameters.properties.contains_key("path"));
    assert!(!entry.tool.parameters.is_required("path"));
    assert!(entry.original_parameters().is_required("path"));
    assert_eq!(entry.preset_names(), vec!["path"]);

    // Model-supplied value for a preset name is overridden
    let merged = entry
        .merge_arguments(&json!({ "path": "/home/user/.ssh/id_rsa", "encoding": "utf-8" }))
        .unwrap();
    assert_eq!(merged["path"], json!("/etc/passwd"));
    assert_eq!(merged["encoding"], json!("utf-8"));

    // Presets satisfy required parameters on their own
    let merged = entry.merge_arguments(&json!({})).unwrap();
    assert_eq!(merged["path"], json!("/etc/passwd"));
}

#[tokio::test]
async fn test_unknown_preset_parameter() {
    let catalog = transport().list_tools().await.unwrap();
    let toolset = Toolset::new().with_server(
        "fs",
        ServerPolicy::only(false).with_tool("read_file", ToolPolicy::new().with_preset("mode", json!("ro"))),
    );

    let err = ToolRegistry::resolve(&catalog, [&toolset]).unwrap_err();
    assert!(matches!(err, RegistryError::UnknownPresetParameter { parameter, .. } if parameter == "mode"));
}

#[tokio::test]
async fn test_merge_validates_arguments() {
    let catalog = transport().list_tools().await.unwrap();
    let toolset = Toolset::new().with_server("fs", ServerPolicy::all(false));
    let registry = ToolRegistry::resolve(&catalog, [&toolset]).unwrap();
    let entry = registry.get_qualified("fs__write_file").unwrap();

    let err = entry.merge_arguments(&json!({ "path": "a.txt" })).unwrap_err();
    assert_eq!(err, ValidationError::MissingRequired { name: "content".into() });

    let err = entry.merge_arguments(&json!("a.txt")).unwrap_err();
    assert!(matches!(err, ValidationError::NotAnObject { .. }));
}

#[tokio::test]
async fn test_multiple_toolsets_merge() {
    let catalog = transport().list_tools().await.unwrap();
    let relaxed = Toolset::new().with_server("fs", ServerPolicy::all(false));
    let strict = Toolset::new().with_server(
        "fs",
        ServerPolicy::only(true).with_tool("read_file", ToolPolicy::new().with_preset("encoding", json!("ascii"))),
    );

    let registry = ToolRegistry::resolve(&catalog, [&relaxed, &strict]).unwrap();

    // Stricter approval wins and the preset from the second toolset applies
    let read = registry.get("fs", "read_file").unwrap();
    assert!(read.require_approval);
    assert_eq!(read.preset_names(), vec!["encoding"]);
    assert!(!registry.requires_approval("fs__write_file"));
}

#[tokio::test]
async fn test_no_toolsets_means_no_tools() {
    let catalog = transport().list_tools().await.unwrap();
    let registry = ToolRegistry::resolve(&catalog, std::iter::empty()).unwrap();
    assert!(registry.is_empty());
    assert!(registry.tools().is_empty());
    assert!(!registry.requires_approval("fs__read_file"));
}
