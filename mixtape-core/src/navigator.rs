//! The Navigator: owns the review conversation, filters assistant output to
//! decision tool-calls only, and adjudicates permission requests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;

use crate::error::Result;
use crate::events::{AgentRole, EventSink};
use crate::mcp_bridge;
use crate::message::{AgentMessage, ContentItem, NavigatorCommand, SystemSubtype};
use crate::permission::{PermissionCoordinator, PermissionRequest};
use crate::provider::{ProviderPort, StreamingSession};
use crate::tool_tracker::ToolTracker;

/// Tracks which permission-request ids are currently awaiting a decision,
/// preserving insertion order for the oldest-pending fallback.
#[derive(Default)]
struct PermissionWindow {
    active: Vec<String>,
    decision_shown: std::collections::HashSet<String>,
}

impl PermissionWindow {
    fn open(&mut self, id: String) {
        self.active.push(id);
    }

    fn is_active(&self, id: Option<&str>) -> bool {
        match id {
            Some(id) => self.active.iter().any(|a| a == id),
            None => !self.active.is_empty(),
        }
    }

    fn close(&mut self, id: Option<&str>) {
        let resolved_id = match id {
            Some(id) if self.active.iter().any(|a| a == id) => Some(id.to_string()),
            _ => self.active.first().cloned(),
        };
        if let Some(resolved_id) = resolved_id {
            self.active.retain(|a| a != &resolved_id);
            self.decision_shown.insert(resolved_id);
        }
    }

    fn already_shown(&self, id: Option<&str>) -> bool {
        match id {
            Some(id) => self.decision_shown.contains(id),
            None => false,
        }
    }
}

pub struct Navigator {
    provider: Arc<dyn ProviderPort>,
    system_prompt: String,
    tool_completion_timeout: Duration,
    session: Option<Box<dyn StreamingSession>>,
    tracker: ToolTracker,
    permission_coordinator: Arc<PermissionCoordinator>,
    window: SyncMutex<PermissionWindow>,
    task: String,
    plan: String,
    initialized: bool,
}

impl Navigator {
    pub fn new(
        provider: Arc<dyn ProviderPort>,
        system_prompt: String,
        tool_completion_timeout: Duration,
        permission_coordinator: Arc<PermissionCoordinator>,
    ) -> Self {
        Self {
            provider,
            system_prompt,
            tool_completion_timeout,
            session: None,
            tracker: ToolTracker::new(),
            permission_coordinator,
            window: SyncMutex::new(PermissionWindow::default()),
            task: String::new(),
            plan: String::new(),
            initialized: false,
        }
    }

    /// Stores the task and plan used to build the first ("initial") prompt.
    pub fn initialize(&mut self, task: impl Into<String>, plan: impl Into<String>) {
        self.task = task.into();
        self.plan = plan.into();
    }

    /// Installs the diagnostic event sink, routing this navigator's tool
    /// bookkeeping through it as `AgentRole::Navigator` events.
    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.tracker.set_event_sink(AgentRole::Navigator, sink);
    }

    async fn ensure_session(&mut self) -> Result<()> {
        if self.session.is_none() {
            let session = self
                .provider
                .create_streaming_session(
                    self.system_prompt.clone(),
                    None,
                    self.tool_completion_timeout,
                )
                .await?;
            self.session = Some(session);
        }
        Ok(())
    }

    /// Processes one Driver message: chooses the initial/review/continue
    /// prompt template, pushes it, and returns surfaced `code_review`
    /// commands (approve/deny route to the coordinator, never surfaced).
    pub async fn process_driver_message(
        &mut self,
        driver_text: &str,
        review_requested: bool,
    ) -> Result<Vec<NavigatorCommand>> {
        self.ensure_session().await?;
        let prompt = if !self.initialized {
            self.initialized = true;
            format!(
                "Task: {}\n\nPlan:\n{}\n\nDriver says:\n{}",
                self.task, self.plan, driver_text
            )
        } else if review_requested {
            format!(
                "The driver requests review. Respond with exactly one code_review tool call.\n\n{driver_text}"
            )
        } else {
            format!("Driver update:\n{driver_text}")
        };
        self.run_turn(prompt).await
    }

    /// Registers the request as active and delivers a permission prompt into
    /// the Navigator's input stream. This is the `PermissionCoordinator`'s
    /// injected sink target — it does not itself resolve the decision. The
    /// decision is routed back via `PermissionCoordinator::submit_decision`
    /// as a side effect of draining the resulting turn, and observed by
    /// whichever caller is awaiting `PermissionCoordinator::request` for
    /// this request-id.
    pub async fn deliver_permission_prompt(&mut self, request: PermissionRequest) -> Result<()> {
        let id = request.request_id.to_string();
        self.window.lock().open(id.clone());

        self.ensure_session().await?;

        let prompt = format!(
            "Permission request {id} for tool `{}` with input {}. Approve or deny with requestId=\"{id}\".\n\nDriver transcript so far:\n{}",
            request.tool_name, request.input, request.driver_transcript
        );

        self.run_turn(prompt).await?;
        Ok(())
    }

    /// Runs one turn: reads messages until batch boundary, filtering free
    /// text and extracting decision tool-calls.
    async fn run_turn(&mut self, prompt: String) -> Result<Vec<NavigatorCommand>> {
        self.session.as_mut().unwrap().push_text(prompt).await?;
        self.drain_turn().await
    }

    async fn drain_turn(&mut self) -> Result<Vec<NavigatorCommand>> {
        let mut surfaced = Vec::new();
        let mut any_admitted = false;

        loop {
            let message = match self.session.as_mut().unwrap().next_message().await {
                Some(msg) => msg?,
                None => break,
            };

            match message {
                AgentMessage::Assistant { content } => {
                    for item in content {
                        match item {
                            // Navigator free-form text is never surfaced.
                            ContentItem::Text(_) => {}
                            ContentItem::ToolUse(tool_use) => {
                                self.tracker.mark_pending(
                                    tool_use.id.clone(),
                                    tool_use.name.clone(),
                                    tool_use.input.clone(),
                                );
                                if !mcp_bridge::is_navigator_command_tool(&tool_use.name) {
                                    continue;
                                }
                                let Some(cmd) = mcp_bridge::parse_navigator_command(&tool_use)
                                else {
                                    continue;
                                };
                                match cmd {
                                    NavigatorCommand::CodeReview { .. } => {
                                        surfaced.push(cmd);
                                        any_admitted = true;
                                    }
                                    NavigatorCommand::Approve { ref request_id, .. }
                                    | NavigatorCommand::Deny { ref request_id, .. } => {
                                        let mut window = self.window.lock();
                                        let admissible = window.is_active(request_id.as_deref());
                                        let duplicate =
                                            window.already_shown(request_id.as_deref());
                                        if admissible && !duplicate {
                                            window.close(request_id.as_deref());
                                            drop(window);
                                            self.permission_coordinator.submit_decision(cmd);
                                            any_admitted = true;
                                        } else {
                                            tracing::warn!(
                                                ?request_id,
                                                "navigator decision outside active permission window, dropped"
                                            );
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                AgentMessage::User { results } => {
                    for result in results {
                        self.tracker.mark_resolved(&result.tool_use_id);
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
                AgentMessage::Result => break,
            }
        }

        if !any_admitted && !self.window.lock().active.is_empty() {
            self.permission_coordinator.handle_malformed();
        }

        Ok(surfaced)
    }

    pub async fn interrupt(&mut self) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            session.interrupt().await?;
        }
        Ok(())
    }
}
