use arbor_llm::ToolCall;
use arbor_mcp::{split_qualified, ToolRegistry, ToolTransport};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};

/// Result of one tool call, success text or error text
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call: ToolCall,
    pub output: String,
    pub is_error: bool,
    pub duration_ms: u64,
}

impl ToolOutcome {
    fn failed(call: ToolCall, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            call,
            output: message.into(),
            is_error: true,
            duration_ms,
        }
    }
}

/// Run every call concurrently and return outcomes in call order
///
/// One task per call; the fan-in channel holds exactly one slot per call.
/// On cancellation the in-flight tasks are aborted and nothing is returned.
pub async fn execute_all(
    registry: Arc<ToolRegistry>,
    transport: Arc<dyn ToolTransport>,
    calls: Vec<ToolCall>,
    cancel: &CancellationToken,
) -> Result<Vec<ToolOutcome>> {
    let (tx, mut rx) = mpsc::channel(calls.len().max(1));
    let mut handles = Vec::with_capacity(calls.len());

    for (index, call) in calls.iter().cloned().enumerate() {
        let tx = tx.clone();
        let registry = Arc::clone(&registry);
        let transport = Arc::clone(&transport);
        let token = cancel.child_token();

        handles.push(tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                outcome = run_call(&registry, transport.as_ref(), call) => outcome,
            };
            let _ = tx.send((index, outcome)).await;
        }));
    }
    drop(tx);

    let mut slots: Vec<Option<ToolOutcome>> = vec![None; calls.len()];
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                for handle in &handles {
                    handle.abort();
                }
                tracing::info!(calls = calls.len(), "Tool execution cancelled");
                return Err(AgentError::Cancelled);
            }
            received = rx.recv() => match received {
                Some((index, outcome)) => slots[index] = Some(outcome),
                None => break,
            },
        }
    }

    Ok(calls
        .into_iter()
        .zip(slots)
        .map(|(call, slot)| slot.unwrap_or_else(|| ToolOutcome::failed(call, "Tool task ended without a result", 0)))
        .collect())
}

async fn run_call(registry: &ToolRegistry, transport: &dyn ToolTransport, call: ToolCall) -> ToolOutcome {
    let started = Instant::now();
    let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

    let resolved = registry
        .get_qualified(&call.name)
        .zip(split_qualified(&call.name))
        .map(|(entry, (server, tool))| (entry, server.to_string(), tool.to_string()));
    let Some((entry, server, tool)) = resolved else {
        tracing::warn!(tool = %call.name, call_id = %call.id, "Model requested an unknown tool");
        let message = format!("Unknown tool '{}'", call.name);
        return ToolOutcome::failed(call, message, 0);
    };

    let arguments = match call.arguments_value() {
        Ok(value) => value,
        Err(err) => {
            let message = format!("Invalid JSON arguments: {}", err);
            return ToolOutcome::failed(call, message, 0);
        }
    };

    let arguments = match entry.merge_arguments(&arguments) {
        Ok(arguments) => arguments,
        Err(err) => {
            tracing::debug!(tool = %call.name, call_id = %call.id, error = %err, "Tool arguments rejected");
            let message = format!("Invalid arguments: {}", err);
            return ToolOutcome::failed(call, message, 0);
        }
    };

    tracing::debug!(server = %server, tool = %tool, call_id = %call.id, "Calling tool");
    match transport.call_tool(&server, &tool, arguments).await {
        Ok(output) => {
            let duration_ms = elapsed(started);
            tracing::info!(tool = %call.name, call_id = %call.id, duration_ms, "Tool call finished");
            ToolOutcome {
                call,
                output,
                is_error: false,
                duration_ms,
            }
        }
        Err(err) => {
            let duration_ms = elapsed(started);
            tracing::warn!(tool = %call.name, call_id = %call.id, duration_ms, error = %err, "Tool call failed");
            ToolOutcome::failed(call, format!("{:#}", err), duration_ms)
        }
    }
}

/// Combined, human-readable report of a tool round, one block per call
///
/// Arguments are shown as the model wrote them; preset values never appear.
pub fn render_report(outcomes: &[ToolOutcome]) -> String {
    outcomes
        .iter()
        .map(|outcome| {
            let arguments = match outcome.call.arguments.trim() {
                "" => "{}",
                raw => raw,
            };
            let label = if outcome.is_error { "Error" } else { "Result" };
            format!(
                "### {} ({})\nArguments: {}\n{}:\n{}",
                outcome.call.name, outcome.call.id, arguments, label, outcome.output
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_llm::{Property, Tool};
    use arbor_mcp::{ServerPolicy, StaticTransport, ToolPolicy, Toolset};
    use std::time::Duration;

    async fn setup() -> (Arc<ToolRegistry>, StaticTransport) {
        let schema = Property::object().with_property("path", Property::string(), true);
        let transport = StaticTransport::new()
            .with_tool("fs", Tool::new("read", "Read a file", schema.clone()))
            .with_tool("fs", Tool::new("stat", "Stat a file", schema))
            .with_response("fs", "read", |args| Ok(format!("contents of {}", args["path"].as_str().unwrap_or(""))))
            .with_failure("fs", "stat", "permission denied");

        let toolset = Toolset::new().with_server(
            "fs",
            ServerPolicy::only(false)
                .with_tool("read", ToolPolicy::new())
                .with_tool("stat", ToolPolicy::new()),
        );
        let catalog = transport.list_tools().await.unwrap();
        let registry = ToolRegistry::resolve(&catalog, [&toolset]).unwrap();
        (Arc::new(registry), transport)
    }

    #[tokio::test]
    async fn test_outcomes_follow_call_order() {
        let (registry, transport) = setup().await;
        let transport = transport.with_delay("fs", "read", Duration::from_millis(50));
        let calls = vec![
            ToolCall::new("c1", "fs__read", r#"{"path":"a"}"#),
            ToolCall::new("c2", "fs__stat", r#"{"path":"b"}"#),
            ToolCall::new("c3", "fs__missing", "{}"),
        ];

        let outcomes = execute_all(registry, Arc::new(transport), calls, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = outcomes.iter().map(|o| o.call.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(!outcomes[0].is_error);
        assert_eq!(outcomes[0].output, "contents of a");
        assert!(outcomes[1].is_error);
        assert!(outcomes[1].output.contains("permission denied"));
        assert!(outcomes[2].output.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_validation_error_is_result_text() {
        let (registry, transport) = setup().await;
        let calls = vec![ToolCall::new("c1", "fs__read", r#"{"path":5}"#)];

        let outcomes = execute_all(registry, Arc::new(transport.clone()), calls, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcomes[0].is_error);
        assert!(outcomes[0].output.starts_with("Invalid arguments"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_discards_results() {
        let (registry, transport) = setup().await;
        let transport = transport.with_delay("fs", "read", Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let calls = vec![ToolCall::new("c1", "fs__read", r#"{"path":"a"}"#)];
        let result = execute_all(registry, Arc::new(transport), calls, &cancel).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
    }

    #[test]
    fn test_render_report() {
        let outcomes = vec![
            ToolOutcome {
                call: ToolCall::new("c1", "fs__read", r#"{"path":"a"}"#),
                output: "hello".into(),
                is_error: false,
                duration_ms: 3,
            },
            ToolOutcome::failed(ToolCall::new("c2", "fs__stat", ""), "boom", 0),
        ];

        let report = render_report(&outcomes);
        assert_eq!(
            report,
            "### fs__read (c1)\nArguments: {\"path\":\"a\"}\nResult:\nhello\n\n### fs__stat (c2)\nArguments: {}\nError:\nboom"
        );
        assert_eq!(render_report(&[]), "");
    }
}
