//! A scriptable, in-process [`ProviderPort`] for tests.
//!
//! Grounded on the teacher's `test_utils::MockProvider`: a shared queue of
//! canned responses, consumed FIFO, with a call counter for assertions.
//! Extended here from "one queue of complete responses" to "one script per
//! session, each script a queue of turns" since streaming sessions need a
//! distinct batch of messages per `push_text` call, and extended further
//! with an optional per-call delay so timeout paths (tool-completion,
//! permission-request) are exercisable deterministically, and with a shared
//! log of every `push_text` call so tests can assert on exactly what prompt
//! text a session received, not just what it returned.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::message::{AgentMessage, ContentItem, ToolResultItem};

use super::{AgentSession, CanUseTool, ProviderError, ProviderPort, StreamingSession, ToolPermission};

/// One session's worth of scripted output: a queue of turns, where turn `n`
/// is returned in response to the session's `n`th input (the initial prompt
/// for turn 0, each subsequent `push_text` for streaming sessions).
pub type SessionScript = VecDeque<Vec<AgentMessage>>;

struct Shared {
    scripts: Mutex<VecDeque<SessionScript>>,
    call_count: AtomicUsize,
    delay: Option<Duration>,
    pushed: Mutex<Vec<String>>,
}

/// A [`ProviderPort`] backed entirely by pre-scripted [`AgentMessage`]
/// sequences. One script is consumed per `create_one_shot_session` or
/// `create_streaming_session` call.
#[derive(Clone)]
pub struct MockProviderPort {
    shared: Arc<Shared>,
}

impl Default for MockProviderPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProviderPort {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                scripts: Mutex::new(VecDeque::new()),
                call_count: AtomicUsize::new(0),
                delay: None,
                pushed: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Adds a per-session script consumed by the next session-creation call.
    pub fn with_script(self, script: SessionScript) -> Self {
        self.shared.scripts.lock().push_back(script);
        self
    }

    /// Convenience: a one-turn script containing a single assistant text
    /// message, useful for one-shot (Architect) sessions.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        let mut turns = VecDeque::new();
        turns.push_back(vec![AgentMessage::Assistant {
            content: vec![ContentItem::Text(text.into())],
        }]);
        self.with_script(turns)
    }

    /// Applies a fixed delay to every message emission, for exercising
    /// tool-completion and permission-request timeouts deterministically.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        Arc::get_mut(&mut self.shared)
            .map(|s| s.delay = Some(delay))
            .unwrap_or(());
        self
    }

    pub fn call_count(&self) -> usize {
        self.shared.call_count.load(Ordering::SeqCst)
    }

    /// Every `push_text` a streaming session created by this port has
    /// received so far, in order, across all sessions.
    pub fn pushed_texts(&self) -> Vec<String> {
        self.shared.pushed.lock().clone()
    }

    fn next_script(&self) -> Option<SessionScript> {
        self.shared.scripts.lock().pop_front()
    }
}

#[async_trait]
impl ProviderPort for MockProviderPort {
    async fn create_one_shot_session(
        &self,
        _system_prompt: String,
    ) -> Result<Box<dyn AgentSession>, ProviderError> {
        self.shared.call_count.fetch_add(1, Ordering::SeqCst);
        let script = self
            .next_script()
            .ok_or_else(|| ProviderError::Other("mock script exhausted".into()))?;
        Ok(Box::new(MockOneShotSession {
            script,
            delay: self.shared.delay,
        }))
    }

    async fn create_streaming_session(
        &self,
        _system_prompt: String,
        can_use_tool: Option<CanUseTool>,
        _tool_completion_timeout: Duration,
    ) -> Result<Box<dyn StreamingSession>, ProviderError> {
        self.shared.call_count.fetch_add(1, Ordering::SeqCst);
        let script = self.next_script().unwrap_or_default();
        Ok(Box::new(MockStreamingSession {
            turns: script,
            buffer: VecDeque::new(),
            can_use_tool,
            delay: self.shared.delay,
            ended: false,
            shared: self.shared.clone(),
        }))
    }
}

struct MockOneShotSession {
    script: SessionScript,
    delay: Option<Duration>,
}

#[async_trait]
impl AgentSession for MockOneShotSession {
    async fn run(&mut self, _prompt: String) -> Result<Vec<AgentMessage>, ProviderError> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let mut messages = self.script.pop_front().unwrap_or_default();
        messages.push(AgentMessage::Result);
        Ok(messages)
    }
}

struct MockStreamingSession {
    turns: SessionScript,
    buffer: VecDeque<AgentMessage>,
    can_use_tool: Option<CanUseTool>,
    delay: Option<Duration>,
    ended: bool,
    shared: Arc<Shared>,
}

#[async_trait]
impl StreamingSession for MockStreamingSession {
    async fn push_text(&mut self, text: String) -> Result<(), ProviderError> {
        if self.ended {
            return Err(ProviderError::SessionEnded);
        }
        self.shared.pushed.lock().push(text);
        let turn = self.turns.pop_front().unwrap_or_default();
        for message in turn {
            if let AgentMessage::Assistant { ref content } = message {
                let tool_uses: Vec<_> = content
                    .iter()
                    .filter_map(|item| match item {
                        ContentItem::ToolUse(tu) => Some(tu.clone()),
                        ContentItem::Text(_) => None,
                    })
                    .collect();
                self.buffer.push_back(message);
                if let Some(gate) = &self.can_use_tool {
                    for tool_use in tool_uses {
                        let decision = gate(tool_use.name.clone(), tool_use.input.clone()).await;
                        let result = match decision {
                            ToolPermission::Allow { .. } => ToolResultItem {
                                tool_use_id: tool_use.id.clone(),
                                text: "allowed".to_string(),
                                is_error: false,
                            },
                            ToolPermission::Deny { message } => ToolResultItem {
                                tool_use_id: tool_use.id.clone(),
                                text: message,
                                is_error: true,
                            },
                        };
                        self.buffer.push_back(AgentMessage::User {
                            results: vec![result],
                        });
                    }
                }
            } else {
                self.buffer.push_back(message);
            }
        }
        self.buffer.push_back(AgentMessage::Result);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<AgentMessage, ProviderError>> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.buffer.pop_front().map(Ok)
    }

    async fn interrupt(&mut self) -> Result<(), ProviderError> {
        self.buffer.clear();
        Ok(())
    }

    async fn end(&mut self) -> Result<(), ProviderError> {
        self.ended = true;
        self.buffer.clear();
        Ok(())
    }
}
