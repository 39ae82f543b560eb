//! The Architect: a single-shot planner session.

use std::sync::Arc;

use crate::error::Result;
use crate::message::{AgentMessage, ContentItem};
use crate::provider::ProviderPort;

/// Reserved tool the planner calls to signal the plan is ready, mirroring
/// the "exit plan mode" convention of interactive coding agents.
pub const EXIT_PLAN_MODE_TOOL: &str = "architect.exitPlanMode";

/// Fallback completion phrase checked against the final assistant text when
/// no `EXIT_PLAN_MODE_TOOL` call is observed.
const PLAN_COMPLETE_SENTINEL: &str = "plan complete";

/// Everything the Architect produced for one planning session: the raw
/// message sequence (for display) and the synthesized plan, if the model
/// signaled completion.
pub struct ArchitectOutcome {
    pub messages: Vec<AgentMessage>,
    pub plan: Option<String>,
}

pub struct Architect {
    provider: Arc<dyn ProviderPort>,
    system_prompt: String,
}

impl Architect {
    pub fn new(provider: Arc<dyn ProviderPort>, system_prompt: String) -> Self {
        Self {
            provider,
            system_prompt,
        }
    }

    /// Runs the one-shot planning session for `task`. Returns `plan: None`
    /// when the model never signals completion (turn-limit or end-of-
    /// conversation with no plan); the orchestrator reports that as a
    /// human-readable failure.
    pub async fn create_plan(&self, task: &str) -> Result<ArchitectOutcome> {
        let mut session = self
            .provider
            .create_one_shot_session(self.system_prompt.clone())
            .await?;

        let prompt = format!(
            "Task: {task}\n\nProduce a step-by-step implementation plan. When the \
             plan is complete, call `{EXIT_PLAN_MODE_TOOL}` or end your final \
             message with \"{PLAN_COMPLETE_SENTINEL}\"."
        );
        let messages = session.run(prompt).await?;

        let mut full_text = String::new();
        let mut signaled = false;
        for message in &messages {
            if let AgentMessage::Assistant { content } = message {
                for item in content {
                    match item {
                        ContentItem::Text(text) => full_text.push_str(text),
                        ContentItem::ToolUse(tool_use) => {
                            if tool_use.name == EXIT_PLAN_MODE_TOOL {
                                signaled = true;
                            }
                        }
                    }
                }
            }
        }

        if !signaled {
            signaled = full_text
                .trim()
                .to_lowercase()
                .ends_with(PLAN_COMPLETE_SENTINEL);
        }

        let plan = if signaled && !full_text.trim().is_empty() {
            Some(full_text.trim().to_string())
        } else {
            None
        };

        Ok(ArchitectOutcome { messages, plan })
    }
}
