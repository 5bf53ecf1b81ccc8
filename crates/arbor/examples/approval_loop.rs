use anyhow::Result;
use arbor::prelude::*;
use arbor::{Property, ServerPolicy, ToolPolicy};
use std::io::{self, Write};
use std::sync::Arc;

/// Offline demo of the approval gate: a scripted model asks to read a file,
/// you approve or reject, and the conversation continues either way.
#[tokio::main]
async fn main() -> Result<()> {
    println!("Arbor approval demo (scripted model, in-memory storage)");
    println!();

    let transport = StaticTransport::new()
        .with_tool(
            "fs",
            Tool::new(
                "read_file",
                "Read a file",
                Property::object().with_property("path", Property::string(), true),
            ),
        )
        .with_response("fs", "read_file", |args| {
            Ok(format!("# {}\nremember the milk", args["path"].as_str().unwrap_or_default()))
        });

    let model = ScriptedModel::new([
        ScriptedTurn::tool_calls(
            "Let me check your notes.",
            vec![ToolCall::new("call_1", "fs__read_file", r#"{"path":"notes.md"}"#)],
        ),
        ScriptedTurn::text("All set. Anything else?"),
    ]);

    let mut config = AppConfig::default();
    config.presets.insert("demo".into(), arbor::Preset::new("scripted").with_toolset("files"));
    config.toolsets.insert(
        "files".into(),
        Toolset::new().with_server(
            "fs",
            ServerPolicy::only(false).with_tool("read_file", ToolPolicy::new().require_approval(true)),
        ),
    );
    init_logging(&config.logging);

    let runtime = Bootstrap::new(config, Arc::new(model))
        .transport(Arc::new(transport))
        .start()
        .await?;
    let repository = runtime.agent.repository().clone();
    let thread = repository.create_thread(None).await?;

    let mut turn: Turn = NewMessage::human(thread.id, None, "What is in my notes?").into();
    loop {
        let (mut events, handle) = runtime.agent.spawn_dispatch(turn, CancellationToken::new());

        print!("\nAssistant: ");
        io::stdout().flush()?;
        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::TextChunk { content } => print!("{}", content),
                AgentEvent::ToolArgumentChunk { path, chunk, .. } => print!("\n  [{}] {}", path, chunk),
                AgentEvent::ToolResult { name, output, duration_ms, .. } => {
                    print!("\n  {} ({}ms): {}", name, duration_ms, output)
                }
                AgentEvent::Error { message, .. } => print!("\nError: {}", message),
                _ => {}
            }
            io::stdout().flush()?;
        }
        println!();

        match handle.await?? {
            TurnOutcome::NeedsApproval { message, calls } => {
                for call in &calls {
                    println!("Approve {} {}? [y/N] ", call.name, call.arguments);
                }
                let mut answer = String::new();
                io::stdin().read_line(&mut answer)?;
                turn = if answer.trim().eq_ignore_ascii_case("y") {
                    message.into()
                } else {
                    NewMessage::rejection(&message, Some("declined in demo")).into()
                };
            }
            _ => break,
        }
    }

    runtime.shutdown().await
}
