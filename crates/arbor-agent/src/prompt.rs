use arbor_mcp::{ToolRegistry, ToolTransport};
use arbor_persist::Message;
use arbor_types::AgentContext;
use std::collections::HashSet;

/// Assemble the system message for one model turn
///
/// Parts, in order: the preset's own text, prompts the preset lists,
/// prompts flagged `always_include`, prompts whose pattern matches the
/// conversation, toolset texts, then texts of MCP servers with at least one
/// tool in scope. A prompt contributes once even if several rules select it.
pub fn system_message(
    context: &AgentContext,
    registry: &ToolRegistry,
    transport: &dyn ToolTransport,
    latest: &str,
    history: &[Message],
) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        if !text.trim().is_empty() {
            parts.push(text.trim().to_string());
        }
    };

    if let Some(text) = &context.preset().system_prompt {
        push(text);
    }

    let prompts = context.prompts();
    let mut included: HashSet<&str> = HashSet::new();
    for prompt in prompts.iter().filter(|p| p.explicit) {
        if included.insert(&prompt.name) {
            push(&prompt.content);
        }
    }
    for prompt in prompts.iter().filter(|p| p.always_include) {
        if included.insert(&prompt.name) {
            push(&prompt.content);
        }
    }

    if prompts.iter().any(|p| p.pattern.is_some()) {
        let conversation = conversation_text(latest, history);
        for prompt in prompts.iter().filter(|p| p.matches(&conversation)) {
            if included.insert(&prompt.name) {
                tracing::debug!(prompt = %prompt.name, "Pattern prompt triggered");
                push(&prompt.content);
            }
        }
    }

    for (_, toolset) in context.toolsets() {
        if let Some(text) = &toolset.system_prompt {
            push(text);
        }
    }

    let servers = &context.config().mcp_servers;
    for server in registry.servers() {
        let configured = servers.get(server).and_then(|s| s.system_prompt.clone());
        if let Some(text) = configured.or_else(|| transport.server_instructions(server)) {
            push(&text);
        }
    }

    parts.join("\n\n")
}

fn conversation_text(latest: &str, history: &[Message]) -> String {
    let mut text = String::from(latest);
    for message in history {
        text.push('\n');
        text.push_str(&message.content);
    }
    text
}
