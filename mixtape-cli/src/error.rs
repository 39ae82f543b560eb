//! CLI-specific error types.

use thiserror::Error;

/// Errors that can occur while parsing and validating CLI arguments, before
/// an orchestrator is ever constructed.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Validation(String),

    #[error("failed to read prompt file {path}: {source}")]
    PromptFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] mixtape_core::Error),

    #[error("configuration error: {0}")]
    Config(#[from] mixtape_core::config::ValidationError),
}

impl CliError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::PromptFile { .. } | Self::Config(_))
    }
}
