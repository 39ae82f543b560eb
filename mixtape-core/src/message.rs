//! The normalized message envelope the orchestrator observes from any
//! provider, and the command types derived from it.
//!
//! Every [`ProviderPort`](crate::provider::ProviderPort) implementation,
//! regardless of backend, emits [`AgentMessage`] values on its session
//! streams. Nothing downstream of a session ever looks at a provider-native
//! wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item of assistant-produced content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text(String),
    ToolUse(ToolUseItem),
}

/// A single tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseItem {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// The result of a single tool invocation, returned to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultItem {
    pub tool_use_id: String,
    pub text: String,
    pub is_error: bool,
}

/// The reason a session emitted a `System` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemSubtype {
    TurnLimitReached,
    ConversationEnded,
    AssistantError,
    PermissionDenied,
}

/// The normalized envelope every session emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentMessage {
    Assistant { content: Vec<ContentItem> },
    User { results: Vec<ToolResultItem> },
    System { subtype: SystemSubtype },
    Result,
}

impl AgentMessage {
    /// Concatenated text of all `Text` content items, in order. Empty for
    /// non-`Assistant` variants.
    pub fn text(&self) -> String {
        match self {
            AgentMessage::Assistant { content } => content
                .iter()
                .filter_map(|item| match item {
                    ContentItem::Text(t) => Some(t.as_str()),
                    ContentItem::ToolUse(_) => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        }
    }

    /// All tool-use items in this message, in order. Empty for non-`Assistant`
    /// variants.
    pub fn tool_uses(&self) -> Vec<&ToolUseItem> {
        match self {
            AgentMessage::Assistant { content } => content
                .iter()
                .filter_map(|item| match item {
                    ContentItem::ToolUse(tu) => Some(tu),
                    ContentItem::Text(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A control command the Driver surfaces via its MCP-bridge decision tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverCommand {
    RequestReview { context: Option<String> },
    RequestGuidance { context: Option<String> },
}

/// A command the Navigator surfaces via its MCP-bridge decision tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigatorCommand {
    CodeReview {
        pass: bool,
        comment: Option<String>,
    },
    Approve {
        request_id: Option<String>,
        comment: Option<String>,
    },
    Deny {
        request_id: Option<String>,
        comment: Option<String>,
    },
}
