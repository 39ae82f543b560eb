//! Provider abstraction: the seam between an agent role and whatever backend
//! actually runs its model.
//!
//! Every backend, mock or real, implements [`ProviderPort`] and speaks only
//! in [`AgentMessage`](crate::message::AgentMessage) — nothing above this
//! module ever sees a provider-native wire format.

pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::message::AgentMessage;

/// Errors a provider implementation can raise while creating or driving a
/// session. These always map to [`crate::error::Error::Provider`] at the
/// orchestrator boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("session already ended")]
    SessionEnded,

    #[error("{0}")]
    Other(String),
}

/// The outcome of a `canUseTool` permission check a provider runs before
/// executing a tool locally.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPermission {
    Allow { updated_input: Option<Value> },
    Deny { message: String },
}

/// Callback a [`ProviderPort`] invokes before executing any tool the model
/// requests, so the orchestrator can route file-modifying tools through the
/// Navigator. Providers that never execute tools locally (e.g. the
/// Navigator's and Architect's own providers) may ignore this and always
/// allow.
pub type CanUseTool = std::sync::Arc<
    dyn Fn(String, Value) -> futures::future::BoxFuture<'static, ToolPermission> + Send + Sync,
>;

/// A single-shot session: one prompt in, a bounded sequence of messages out,
/// terminated by a `Result` sentinel. Used by the Architect, which never
/// receives follow-up input.
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Send the (only) prompt and consume the response stream.
    async fn run(&mut self, prompt: String) -> Result<Vec<AgentMessage>, ProviderError>;
}

/// A long-lived, interruptible session with an open input stream. Used by
/// the Driver and the Navigator.
#[async_trait]
pub trait StreamingSession: Send + Sync {
    /// Push a new user turn into the session's input stream.
    async fn push_text(&mut self, text: String) -> Result<(), ProviderError>;

    /// Pull the next normalized message, or `None` once the session has
    /// ended and the stream is exhausted.
    async fn next_message(&mut self) -> Option<Result<AgentMessage, ProviderError>>;

    /// Interrupt any in-flight turn. Safe to call when idle.
    async fn interrupt(&mut self) -> Result<(), ProviderError>;

    /// Gracefully end the session, releasing backend resources.
    async fn end(&mut self) -> Result<(), ProviderError>;
}

/// Factory for agent sessions. One `ProviderPort` instance is configured per
/// agent role (Architect, Navigator, Driver) and may be backed by different
/// models or backends.
#[async_trait]
pub trait ProviderPort: Send + Sync {
    /// Construct a one-shot session (Architect).
    async fn create_one_shot_session(
        &self,
        system_prompt: String,
    ) -> Result<Box<dyn AgentSession>, ProviderError>;

    /// Construct a streaming session (Driver, Navigator), wired to the given
    /// permission gate and per-tool completion timeout.
    async fn create_streaming_session(
        &self,
        system_prompt: String,
        can_use_tool: Option<CanUseTool>,
        tool_completion_timeout: Duration,
    ) -> Result<Box<dyn StreamingSession>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_permission_equality() {
        let allow = ToolPermission::Allow { updated_input: None };
        let deny = ToolPermission::Deny { message: "no".into() };
        assert_ne!(allow, deny);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Connection("refused".into());
        assert_eq!(err.to_string(), "connection error: refused");
    }
}
