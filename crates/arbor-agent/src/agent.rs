use arbor_llm::{ChatMessage, GenerateRequest, ModelClient, ModelEvent};
use arbor_mcp::{ToolRegistry, ToolTransport};
use arbor_persist::{branch, Message, MessageRepository, NewMessage, Role};
use arbor_types::{AgentContext, AgentEvent, EventSender};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::builder::AgentBuilder;
use crate::error::{AgentError, Result};
use crate::executor::{execute_all, render_report};
use crate::prompt::system_message;
use crate::stream::{send, StreamForwarder};
use crate::turn::{Turn, TurnOutcome};

const SUMMARY_SYSTEM: &str = "You write short titles for conversations.";
const SUMMARY_REQUEST: &str =
    "Give this conversation a title of at most eight words. Answer with the title only.";
const SUMMARY_MAX_CHARS: usize = 80;

/// Turn-taking agent over a branching conversation
///
/// Cheap to clone; every collaborator sits behind an `Arc`. The tool
/// registry is resolved once by [`AgentBuilder::build`] and never changes.
#[derive(Clone)]
pub struct Agent {
    context: Arc<AgentContext>,
    model: Arc<dyn ModelClient>,
    transport: Arc<dyn ToolTransport>,
    repository: Arc<dyn MessageRepository>,
    registry: Arc<ToolRegistry>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub(crate) fn from_parts(
        context: Arc<AgentContext>,
        model: Arc<dyn ModelClient>,
        transport: Arc<dyn ToolTransport>,
        repository: Arc<dyn MessageRepository>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            context,
            model,
            transport,
            repository,
            registry,
        }
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &Arc<dyn MessageRepository> {
        &self.repository
    }

    /// Run one turn of the conversation to its end or to an approval gate
    ///
    /// Tool rounds are followed iteratively until the model answers without
    /// tools. Failures are also reported as a final [`AgentEvent::Error`];
    /// once `cancel` fires, any failure is reported as
    /// [`AgentError::Cancelled`].
    pub async fn dispatch(
        &self,
        turn: impl Into<Turn>,
        cancel: CancellationToken,
        events: EventSender,
    ) -> Result<TurnOutcome> {
        match self.run(turn.into(), &cancel, &events).await {
            Err(err) if cancel.is_cancelled() || err.is_cancelled() => {
                tracing::info!(error = %err, "Dispatch cancelled");
                Err(AgentError::Cancelled)
            }
            Err(AgentError::EventChannelClosed) => {
                tracing::warn!("Event receiver dropped, dispatch aborted");
                Err(AgentError::EventChannelClosed)
            }
            Err(err) => {
                tracing::error!(error = %err, "Dispatch failed");
                let _ = events.send(AgentEvent::error(err.to_string())).await;
                Err(err)
            }
            Ok(outcome) => Ok(outcome),
        }
    }

    /// [`Agent::dispatch`] on a background task
    ///
    /// The receiver closes once the dispatch has finished.
    pub fn spawn_dispatch(
        &self,
        turn: impl Into<Turn>,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<AgentEvent>, JoinHandle<Result<TurnOutcome>>) {
        let (tx, rx) = mpsc::channel(self.context.event_buffer());
        let agent = self.clone();
        let turn = turn.into();

        let handle = tokio::spawn(async move { agent.dispatch(turn, cancel, tx).await });

        (rx, handle)
    }

    async fn run(&self, turn: Turn, cancel: &CancellationToken, events: &EventSender) -> Result<TurnOutcome> {
        let mut current = match turn {
            Turn::New(message) => {
                if !matches!(message.role, Role::Human | Role::Tool) {
                    return Err(AgentError::UnsupportedRole(message.role));
                }
                self.persist(message, events).await?
            }
            Turn::Existing(message) => {
                if message.requests_tools() {
                    let thread_messages = self.repository.list_messages(message.thread_id).await?;
                    if !branch::is_pending(&message, &thread_messages) {
                        tracing::warn!(message_id = %message.id, "Tool calls already answered");
                        return Err(AgentError::AlreadyResolved(message.id));
                    }
                }
                message
            }
        };

        let mut model_turns = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            match current.role {
                Role::Human | Role::Tool => {
                    if let Some(limit) = self.context.max_iterations() {
                        if model_turns >= limit {
                            return Err(AgentError::MaxIterations(limit));
                        }
                    }
                    model_turns += 1;

                    let Some(assistant) = self.generate_turn(&current, cancel, events).await? else {
                        return Ok(TurnOutcome::NoResponse(current));
                    };

                    if !assistant.requests_tools() {
                        return Ok(TurnOutcome::Completed(assistant));
                    }

                    let gated: Vec<&str> = assistant
                        .tool_calls
                        .iter()
                        .filter(|call| self.registry.requires_approval(&call.name))
                        .map(|call| call.name.as_str())
                        .collect();
                    if !gated.is_empty() {
                        tracing::info!(
                            message_id = %assistant.id,
                            tools = ?gated,
                            "Tool calls need approval"
                        );
                        let calls = assistant.tool_calls.clone();
                        send(
                            events,
                            AgentEvent::ToolApprovalRequested {
                                message: assistant.clone(),
                                calls: calls.clone(),
                            },
                        )
                        .await?;
                        return Ok(TurnOutcome::NeedsApproval {
                            message: assistant,
                            calls,
                        });
                    }

                    current = assistant;
                }
                Role::Assistant if current.requests_tools() => {
                    current = self.execute_tools(&current, cancel, events).await?;
                }
                role => return Err(AgentError::UnsupportedRole(role)),
            }
        }
    }

    /// Ask the model to answer `input`; `None` when the stream ended early
    async fn generate_turn(
        &self,
        input: &Message,
        cancel: &CancellationToken,
        events: &EventSender,
    ) -> Result<Option<Message>> {
        let history = self
            .repository
            .get_messages(input.thread_id, Some(input.id), false)
            .await?;
        let earlier: Vec<Message> = history.iter().filter(|m| m.id != input.id).cloned().collect();
        let system = system_message(
            &self.context,
            &self.registry,
            self.transport.as_ref(),
            &input.content,
            &earlier,
        );

        let preset = self.context.preset();
        let request = GenerateRequest::new(preset.model.clone(), history.iter().map(ChatMessage::from).collect())
            .with_system(system)
            .with_tools(self.registry.tools());

        tracing::debug!(
            thread_id = %input.thread_id,
            message_id = %input.id,
            history = history.len(),
            tools = request.tools.len(),
            "Generating model turn"
        );

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            stream = self.model.generate(request) => stream.map_err(AgentError::Model)?,
        };

        let Some(completion) = StreamForwarder::new(&self.registry, events).forward(stream, cancel).await? else {
            tracing::warn!(message_id = %input.id, "Model stream ended without a response");
            return Ok(None);
        };

        let mut reply = NewMessage::assistant(
            input.thread_id,
            Some(input.id),
            completion.content,
            completion.tool_calls,
        );
        reply.model_name = Some(preset.model.clone());
        reply.provider = preset.provider.clone();

        let message = self.persist(reply, events).await?;
        tracing::info!(
            thread_id = %message.thread_id,
            message_id = %message.id,
            tool_calls = message.tool_calls.len(),
            "Assistant message stored"
        );
        Ok(Some(message))
    }

    /// Run the calls of `assistant` and store the combined report as its child
    async fn execute_tools(
        &self,
        assistant: &Message,
        cancel: &CancellationToken,
        events: &EventSender,
    ) -> Result<Message> {
        let outcomes = execute_all(
            Arc::clone(&self.registry),
            Arc::clone(&self.transport),
            assistant.tool_calls.clone(),
            cancel,
        )
        .await?;

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let report = render_report(&outcomes);
        let message = self.persist(assistant.reply(Role::Tool, report), events).await?;

        for outcome in outcomes {
            send(
                events,
                AgentEvent::ToolResult {
                    call_id: outcome.call.id,
                    name: outcome.call.name,
                    output: outcome.output,
                    is_error: outcome.is_error,
                    duration_ms: outcome.duration_ms,
                },
            )
            .await?;
        }
        Ok(message)
    }

    /// Store, then announce
    async fn persist(&self, message: NewMessage, events: &EventSender) -> Result<Message> {
        let message = self.repository.append_message(message).await?;
        send(events, AgentEvent::NewMessage { message: message.clone() }).await?;
        Ok(message)
    }

    /// Generate a short title for a branch and store it as the thread summary
    ///
    /// Returns `None` when the branch is empty or the model gave no usable
    /// text.
    pub async fn summarize_thread(&self, thread_id: Uuid, head: Option<Uuid>) -> Result<Option<String>> {
        let history = self.repository.get_messages(thread_id, head, false).await?;
        if history.is_empty() {
            return Ok(None);
        }

        let mut chat: Vec<ChatMessage> = history.iter().map(ChatMessage::from).collect();
        chat.push(ChatMessage::human(SUMMARY_REQUEST));
        let request = GenerateRequest::new(self.context.preset().model.clone(), chat).with_system(SUMMARY_SYSTEM);

        let mut stream = self.model.generate(request).await.map_err(AgentError::Model)?;
        let mut streamed = String::new();
        let mut completed = None;
        while let Some(event) = stream.next().await {
            match event.map_err(AgentError::Model)? {
                ModelEvent::Text { content } => streamed.push_str(&content),
                ModelEvent::Completed { content, .. } => {
                    completed = Some(content);
                    break;
                }
                ModelEvent::ToolArguments { .. } => {}
            }
        }

        let Some(summary) = clean_summary(completed.as_deref().unwrap_or(&streamed)) else {
            return Ok(None);
        };
        self.repository.set_thread_summary(thread_id, summary.clone()).await?;
        tracing::info!(thread_id = %thread_id, summary = %summary, "Thread summary updated");
        Ok(Some(summary))
    }
}

/// First non-empty line, unquoted and bounded in length
fn clean_summary(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c| c == '"' || c == '\'' || c == '#' || c == '*').trim();
    if line.is_empty() {
        return None;
    }
    Some(line.chars().take(SUMMARY_MAX_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_summary() {
        assert_eq!(clean_summary("\n  \"Rust borrow checker\"  \nmore"), Some("Rust borrow checker".into()));
        assert_eq!(clean_summary("## Title"), Some("Title".into()));
        assert_eq!(clean_summary("   \n"), None);
        assert_eq!(clean_summary("\"\""), None);
        assert_eq!(clean_summary(&"x".repeat(200)).map(|s| s.len()), Some(SUMMARY_MAX_CHARS));
    }
}
