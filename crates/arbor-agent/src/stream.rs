use arbor_llm::{IncrementalJsonParser, ModelEvent, ModelStream, ToolCall};
use arbor_mcp::ToolRegistry;
use arbor_types::{AgentEvent, EventSender};
use futures::StreamExt;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};

/// Final text and tool calls of one model turn
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Argument stream of one tool call, keyed by its index in the turn
struct CallStream {
    id: Option<String>,
    /// Dropped after a parse error; later chunks are ignored
    parser: Option<IncrementalJsonParser>,
    /// Set once the tool name resolved to a registry schema
    typed: bool,
}

/// Forwards a model stream to the caller's event channel
///
/// Owns one parser per tool-call index so argument updates can be
/// surfaced while the model is still writing them.
pub struct StreamForwarder<'a> {
    registry: &'a ToolRegistry,
    events: &'a EventSender,
    calls: HashMap<u32, CallStream>,
}

impl<'a> StreamForwarder<'a> {
    pub fn new(registry: &'a ToolRegistry, events: &'a EventSender) -> Self {
        Self {
            registry,
            events,
            calls: HashMap::new(),
        }
    }

    /// Drive `stream` to its end
    ///
    /// Returns `None` when the stream ends without a completion event.
    pub async fn forward(mut self, mut stream: ModelStream, cancel: &CancellationToken) -> Result<Option<Completion>> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                next = stream.next() => next,
            };

            let Some(item) = next else {
                tracing::debug!("Model stream ended without completion");
                return Ok(None);
            };

            match item.map_err(AgentError::Model)? {
                ModelEvent::Text { content } => {
                    send(self.events, AgentEvent::TextChunk { content }).await?;
                }
                ModelEvent::ToolArguments { index, id, name, chunk } => {
                    self.on_arguments(index, id, name, &chunk).await?;
                }
                ModelEvent::Completed { content, tool_calls } => {
                    return Ok(Some(Completion { content, tool_calls }));
                }
            }
        }
    }

    async fn on_arguments(&mut self, index: u32, id: Option<String>, name: Option<String>, chunk: &str) -> Result<()> {
        let call = self.calls.entry(index).or_insert_with(|| CallStream {
            id: None,
            parser: Some(IncrementalJsonParser::new()),
            typed: false,
        });
        if id.is_some() {
            call.id = id;
        }

        let Some(parser) = call.parser.as_mut() else {
            return Ok(());
        };

        // The name may arrive on any chunk of the call
        if !call.typed {
            if let Some(entry) = name.as_deref().and_then(|n| self.registry.get_qualified(n)) {
                parser.set_schema(&entry.tool.parameters);
                call.typed = true;
            }
        }

        match parser.feed(chunk) {
            Ok(updates) => {
                let call_id = call.id.clone();
                for update in updates {
                    send(
                        self.events,
                        AgentEvent::ToolArgumentChunk {
                            index,
                            call_id: call_id.clone(),
                            path: update.path,
                            chunk: update.chunk,
                            declared_type: update.declared_type,
                        },
                    )
                    .await?;
                }
            }
            Err(err) => {
                tracing::warn!(index, call_id = ?call.id, error = %err, "Tool argument stream is malformed");
                call.parser = None;
                let call_id = call.id.clone();
                send(
                    self.events,
                    AgentEvent::Error {
                        message: format!("Malformed arguments for tool call {}: {}", index, err),
                        call_id,
                    },
                )
                .await?;
            }
        }
        Ok(())
    }
}

pub(crate) async fn send(events: &EventSender, event: AgentEvent) -> Result<()> {
    events.send(event).await.map_err(|_| AgentError::EventChannelClosed)
}
