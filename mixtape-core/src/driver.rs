//! The Driver: owns the implementation conversation, batches output for the
//! orchestrator, and surfaces in-conversation control commands.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use crate::events::{AgentRole, EventSink};
use crate::mcp_bridge;
use crate::message::{AgentMessage, ContentItem, DriverCommand, SystemSubtype};
use crate::provider::{CanUseTool, ProviderPort, StreamingSession};
use crate::tool_tracker::ToolTracker;

/// Tool names the orchestrator routes through the Navigator's permission
/// gate before a provider is allowed to execute them locally.
pub const FILE_MODIFICATION_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

pub fn is_modification_tool(name: &str) -> bool {
    FILE_MODIFICATION_TOOLS.contains(&name)
}

/// A tool call summary surfaced to the UI alongside the Driver's text.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallSummary {
    pub name: String,
    pub input: Value,
    pub is_modification: bool,
}

/// The accumulated output of one Driver turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverBatch {
    pub text: String,
    pub tool_calls: Vec<ToolCallSummary>,
}

#[derive(Default)]
struct Accumulator {
    text: String,
    tool_calls: Vec<ToolCallSummary>,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tool_calls.is_empty()
    }

    fn take(&mut self) -> DriverBatch {
        DriverBatch {
            text: std::mem::take(&mut self.text),
            tool_calls: std::mem::take(&mut self.tool_calls),
        }
    }
}

pub struct Driver {
    provider: Arc<dyn ProviderPort>,
    system_prompt: String,
    can_use_tool: Option<CanUseTool>,
    tool_completion_timeout: Duration,
    session: Option<Box<dyn StreamingSession>>,
    tracker: ToolTracker,
    /// Shared with the orchestrator so a `canUseTool` callback invoked
    /// mid-turn can read the transcript accumulated so far.
    transcript: Arc<AsyncMutex<String>>,
    commands: SyncMutex<Vec<DriverCommand>>,
}

impl Driver {
    pub fn new(
        provider: Arc<dyn ProviderPort>,
        system_prompt: String,
        can_use_tool: Option<CanUseTool>,
        tool_completion_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            system_prompt,
            can_use_tool,
            tool_completion_timeout,
            session: None,
            tracker: ToolTracker::new(),
            transcript: Arc::new(AsyncMutex::new(String::new())),
            commands: SyncMutex::new(Vec::new()),
        }
    }

    /// Handle shared with the orchestrator for reading the in-flight
    /// transcript from a concurrently-invoked `canUseTool` callback.
    pub fn transcript_handle(&self) -> Arc<AsyncMutex<String>> {
        self.transcript.clone()
    }

    /// Installs the permission gate. Only takes effect if no streaming
    /// session has been created yet; the orchestrator calls this once,
    /// immediately after construction, before the first implementation turn.
    pub fn set_can_use_tool(&mut self, can_use_tool: Option<CanUseTool>) {
        self.can_use_tool = can_use_tool;
    }

    /// Installs the diagnostic event sink, routing this driver's tool
    /// bookkeeping through it as `AgentRole::Driver` events.
    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.tracker.set_event_sink(AgentRole::Driver, sink);
    }

    pub fn has_pending_tools(&self) -> bool {
        self.tracker.pending_count() > 0
    }

    /// Atomically returns and clears commands accumulated since the last
    /// call.
    pub fn drain_commands(&self) -> Vec<DriverCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    pub async fn interrupt(&mut self) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            session.interrupt().await?;
        }
        Ok(())
    }

    async fn ensure_session(&mut self) -> Result<()> {
        if self.session.is_none() {
            let session = self
                .provider
                .create_streaming_session(
                    self.system_prompt.clone(),
                    self.can_use_tool.clone(),
                    self.tool_completion_timeout,
                )
                .await?;
            self.session = Some(session);
        }
        Ok(())
    }

    pub async fn start_implementation(&mut self, plan: &str) -> Result<DriverBatch> {
        self.ensure_session().await?;
        let prompt = format!("Implement the following plan:\n\n{plan}");
        self.push_and_process(prompt).await
    }

    pub async fn continue_with_feedback(&mut self, text: &str) -> Result<DriverBatch> {
        self.ensure_session().await?;
        self.push_and_process(text.to_string()).await
    }

    async fn push_and_process(&mut self, text: String) -> Result<DriverBatch> {
        let session = self
            .session
            .as_mut()
            .expect("ensure_session called before push_and_process");
        session.push_text(text).await?;

        let mut accumulator = Accumulator::default();

        loop {
            let message = match tokio::time::timeout(
                self.tool_completion_timeout,
                next_or_end(self.session.as_mut().unwrap()),
            )
            .await
            {
                Ok(Some(msg)) => msg?,
                Ok(None) => break,
                Err(_) => {
                    self.interrupt().await.ok();
                    return Err(Error::ToolTimeout(self.tool_completion_timeout));
                }
            };

            match message {
                AgentMessage::Assistant { content } => {
                    for item in content {
                        match item {
                            ContentItem::Text(text) => {
                                accumulator.text.push_str(&text);
                                let mut transcript = self.transcript.lock().await;
                                transcript.push_str(&text);
                            }
                            ContentItem::ToolUse(tool_use) => {
                                self.tracker.mark_pending(
                                    tool_use.id.clone(),
                                    tool_use.name.clone(),
                                    tool_use.input.clone(),
                                );
                                let is_modification = is_modification_tool(&tool_use.name);
                                if is_modification {
                                    let mut transcript = self.transcript.lock().await;
                                    transcript.push_str(&format!(
                                        "\n[driver modifies {}]\n",
                                        tool_use
                                            .input
                                            .get("file_path")
                                            .and_then(|v| v.as_str())
                                            .unwrap_or("?")
                                    ));
                                }
                                accumulator.tool_calls.push(ToolCallSummary {
                                    name: tool_use.name,
                                    input: tool_use.input,
                                    is_modification,
                                });
                            }
                        }
                    }
                }
                AgentMessage::User { results } => {
                    for result in results {
                        if let Some(resolved) = self.tracker.mark_resolved(&result.tool_use_id) {
                            if mcp_bridge::is_driver_command_tool(&resolved.name) {
                                if let Some(cmd) = mcp_bridge::parse_driver_command(
                                    &crate::message::ToolUseItem {
                                        id: result.tool_use_id.clone(),
                                        name: resolved.name.clone(),
                                        input: resolved.input.clone(),
                                    },
                                ) {
                                    self.commands.lock().push(cmd);
                                }
                            }
                        }
                    }
                    if self.tracker.pending_count() == 0 && !accumulator.is_empty() {
                        return Ok(accumulator.take());
                    }
                }
                AgentMessage::System { subtype } => {
                    if matches!(
                        subtype,
                        SystemSubtype::TurnLimitReached | SystemSubtype::ConversationEnded
                    ) {
                        self.session = None;
                    }
                    break;
                }
                AgentMessage::Result => {
                    return Ok(accumulator.take());
                }
            }
        }

        Ok(accumulator.take())
    }
}

async fn next_or_end(
    session: &mut Box<dyn StreamingSession>,
) -> Option<std::result::Result<AgentMessage, crate::provider::ProviderError>> {
    session.next_message().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProviderPort;
    use crate::message::{ToolResultItem, ToolUseItem};
    use std::collections::VecDeque;

    fn driver_with_script(turns: VecDeque<Vec<AgentMessage>>) -> Driver {
        let provider = Arc::new(MockProviderPort::new().with_script(turns));
        Driver::new(provider, "system".into(), None, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_start_implementation_returns_text_batch() {
        let mut turns = VecDeque::new();
        turns.push_back(vec![AgentMessage::Assistant {
            content: vec![ContentItem::Text("working on it".into())],
        }]);
        let mut driver = driver_with_script(turns);
        let batch = driver.start_implementation("1. do thing").await.unwrap();
        assert_eq!(batch.text, "working on it");
    }

    #[tokio::test]
    async fn test_tool_use_then_result_extracts_driver_command() {
        let mut turns = VecDeque::new();
        turns.push_back(vec![
            AgentMessage::Assistant {
                content: vec![ContentItem::ToolUse(ToolUseItem {
                    id: "t1".into(),
                    name: mcp_bridge::DRIVER_REQUEST_REVIEW.into(),
                    input: serde_json::json!({"context": "done"}),
                })],
            },
            AgentMessage::User {
                results: vec![ToolResultItem {
                    tool_use_id: "t1".into(),
                    text: "ack".into(),
                    is_error: false,
                }],
            },
            AgentMessage::Assistant {
                content: vec![ContentItem::Text("requested review".into())],
            },
        ]);
        let mut driver = driver_with_script(turns);
        let batch = driver.start_implementation("plan").await.unwrap();
        assert_eq!(batch.text, "requested review");
        let commands = driver.drain_commands();
        assert_eq!(
            commands,
            vec![DriverCommand::RequestReview {
                context: Some("done".into())
            }]
        );
        assert!(driver.drain_commands().is_empty());
    }

    #[tokio::test]
    async fn test_modification_tool_annotated_in_transcript() {
        let mut turns = VecDeque::new();
        turns.push_back(vec![AgentMessage::Assistant {
            content: vec![ContentItem::ToolUse(ToolUseItem {
                id: "t1".into(),
                name: "Write".into(),
                input: serde_json::json!({"file_path": "hello.ts"}),
            })],
        }]);
        let mut driver = driver_with_script(turns);
        let handle = driver.transcript_handle();
        let _batch = driver.start_implementation("plan").await.unwrap();
        let transcript = handle.lock().await;
        assert!(transcript.contains("hello.ts"));
    }

    #[tokio::test]
    async fn test_tool_timeout_interrupts_session() {
        let provider = Arc::new(MockProviderPort::new().with_delay(Duration::from_millis(100)));
        let mut driver = Driver::new(provider, "sys".into(), None, Duration::from_millis(10));
        let err = driver.start_implementation("plan").await.unwrap_err();
        assert!(err.is_tool_timeout());
    }

    #[tokio::test]
    async fn test_bare_turn_limit_system_message_returns_empty_batch_without_panicking() {
        let mut turns = VecDeque::new();
        turns.push_back(vec![AgentMessage::System {
            subtype: crate::message::SystemSubtype::TurnLimitReached,
        }]);
        let mut driver = driver_with_script(turns);
        let batch = driver.start_implementation("plan").await.unwrap();
        assert_eq!(batch, DriverBatch::default());
    }
}
