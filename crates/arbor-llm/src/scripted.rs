use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::streaming::ModelEvent;
use crate::traits::{GenerateRequest, ModelClient, ModelStream};
use crate::types::ToolCall;

/// One scripted step of a model stream
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Event(ModelEvent),
    Error(String),
}

/// Everything the model "says" for one `generate` call
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    steps: Vec<ScriptStep>,
}

impl ScriptedTurn {
    /// Plain text answer, streamed word by word, with a completion event
    pub fn text(content: &str) -> Self {
        let mut steps: Vec<ScriptStep> = split_inclusive_words(content)
            .into_iter()
            .map(|word| ScriptStep::Event(ModelEvent::text(word)))
            .collect();
        steps.push(ScriptStep::Event(ModelEvent::completed(content, Vec::new())));
        Self { steps }
    }

    /// Answer requesting tool calls; arguments are streamed a few bytes at a time
    pub fn tool_calls(content: &str, calls: Vec<ToolCall>) -> Self {
        let mut steps: Vec<ScriptStep> = Vec::new();
        if !content.is_empty() {
            steps.push(ScriptStep::Event(ModelEvent::text(content)));
        }
        for (index, call) in calls.iter().enumerate() {
            let chars: Vec<char> = call.arguments.chars().collect();
            for (n, piece) in chars.chunks(3).enumerate() {
                steps.push(ScriptStep::Event(ModelEvent::ToolArguments {
                    index: index as u32,
                    id: (n == 0).then(|| call.id.clone()),
                    name: (n == 0).then(|| call.name.clone()),
                    chunk: piece.iter().collect(),
                }));
            }
        }
        steps.push(ScriptStep::Event(ModelEvent::completed(content, calls)));
        Self { steps }
    }

    /// Arbitrary event sequence (no completion is added)
    pub fn events(events: Vec<ModelEvent>) -> Self {
        Self {
            steps: events.into_iter().map(ScriptStep::Event).collect(),
        }
    }

    /// Provider failure after the given events
    pub fn failing(events: Vec<ModelEvent>, message: impl Into<String>) -> Self {
        let mut turn = Self::events(events);
        turn.steps.push(ScriptStep::Error(message.into()));
        turn
    }
}

fn split_inclusive_words(content: &str) -> Vec<String> {
    content
        .split_inclusive(' ')
        .map(str::to_string)
        .collect()
}

/// Deterministic [`ModelClient`] that replays scripted turns in order and
/// records every request it receives.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    turns: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleep before every emitted step
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_turn(&self, turn: ScriptedTurn) {
        if let Ok(mut turns) = self.turns.lock() {
            turns.push_back(turn);
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().map(|turns| turns.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let turn = self
            .turns
            .lock()
            .map_err(|_| anyhow!("scripted model lock poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response left"))?;
        let delay = self.delay;

        let stream = async_stream::stream! {
            for step in turn.steps {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                match step {
                    ScriptStep::Event(event) => yield Ok(event),
                    ScriptStep::Error(message) => {
                        yield Err(anyhow!(message));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
