//! Top-level error types for the orchestrator.
//!
//! This module provides a flattened, user-facing error type covering every
//! subsystem, following the error taxonomy of the orchestration design:
//! validation, provider, tool-drain timeouts, permission-path failures, and
//! cancellation.

use thiserror::Error;

use crate::permission::PermissionError;
use crate::provider::ProviderError;

/// Top-level error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum Error {
    /// CLI or configuration input was invalid. Fail fast, print, exit 1.
    #[error("validation error: {0}")]
    Validation(String),

    /// The model backend failed. Surfaced to the orchestrator, which aborts
    /// the current phase and cleans up.
    #[error("provider error: {0}")]
    Provider(String),

    /// A session failed to drain its pending tool calls within the
    /// configured `TOOL_COMPLETION` timeout.
    #[error("tool completion timed out after {0:?}")]
    ToolTimeout(std::time::Duration),

    /// A permission request could not be resolved. This always collapses to
    /// a denial from the Driver's point of view; it is never fatal to the
    /// orchestrator.
    #[error("permission error: {0}")]
    Permission(#[from] PermissionError),

    /// A blocking operation observed cooperative cancellation.
    #[error("cancelled")]
    Cancelled,

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider(_))
    }

    pub fn is_tool_timeout(&self) -> bool {
        matches!(self, Self::ToolTimeout(_))
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;
