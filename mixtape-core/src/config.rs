//! Environment-driven configuration, range-validated at load time.
//!
//! No config-file crate is used here: the teacher's own idiom for this kind
//! of input is explicit constructor validation (`ToolCallAuthorizer`,
//! `AgentBuilder`), not a layered config loader, and nothing else in the
//! source corpus reaches for `figment`/`envy`/`config` for a handful of
//! env-var-driven settings. This module follows that precedent.

use std::time::Duration;

use thiserror::Error;

/// The only provider-type recognized by this build. Real backends are out
/// of scope; a production deployment would register additional type names
/// here without changing the shape of [`OrchestratorConfig`].
pub const MOCK_PROVIDER_TYPE: &str = "mock";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("unknown provider type `{0}` (only `mock` is recognized in this build)")]
    UnknownProviderType(String),

    #[error("{field} requires a model identifier")]
    MissingModel { field: &'static str },

    #[error("{0}")]
    Other(String),
}

/// A `{provider-type, model?}` pair for one agent role.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProviderConfig {
    pub provider_type: String,
    pub model: Option<String>,
}

impl AgentProviderConfig {
    fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        if self.provider_type != MOCK_PROVIDER_TYPE {
            return Err(ValidationError::UnknownProviderType(
                self.provider_type.clone(),
            ));
        }
        let _ = field; // mock provider never requires an explicit model
        Ok(())
    }
}

/// Fully validated orchestrator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub navigator_max_turns: u32,
    pub driver_max_turns: u32,
    pub max_prompt_length: usize,
    pub max_prompt_file_size: usize,
    pub session_hard_limit: Duration,
    pub tool_completion_timeout: Duration,
    pub permission_request_timeout: Duration,
    pub architect: AgentProviderConfig,
    pub navigator: AgentProviderConfig,
    pub driver: AgentProviderConfig,
}

const NAVIGATOR_MAX_TURNS_RANGE: std::ops::RangeInclusive<u32> = 10..=100;
const DRIVER_MAX_TURNS_RANGE: std::ops::RangeInclusive<u32> = 5..=50;
const MAX_PROMPT_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 10..=50_000;
const MAX_PROMPT_FILE_SIZE_RANGE: std::ops::RangeInclusive<usize> = 1024..=1024 * 1024;
const SESSION_HARD_LIMIT_RANGE: std::ops::RangeInclusive<Duration> =
    Duration::from_secs(60)..=Duration::from_secs(8 * 60 * 60);
const TOOL_COMPLETION_TIMEOUT_RANGE: std::ops::RangeInclusive<Duration> =
    Duration::from_secs(1)..=Duration::from_secs(30 * 60);
const PERMISSION_REQUEST_TIMEOUT_RANGE: std::ops::RangeInclusive<Duration> =
    Duration::from_secs(1)..=Duration::from_secs(10 * 60);

impl OrchestratorConfig {
    /// Default values used when an environment variable is unset.
    pub fn defaults() -> Self {
        Self {
            navigator_max_turns: 40,
            driver_max_turns: 20,
            max_prompt_length: 10_000,
            max_prompt_file_size: 100 * 1024,
            session_hard_limit: Duration::from_secs(30 * 60),
            tool_completion_timeout: Duration::from_secs(120),
            permission_request_timeout: Duration::from_secs(30),
            architect: AgentProviderConfig {
                provider_type: MOCK_PROVIDER_TYPE.into(),
                model: None,
            },
            navigator: AgentProviderConfig {
                provider_type: MOCK_PROVIDER_TYPE.into(),
                model: None,
            },
            driver: AgentProviderConfig {
                provider_type: MOCK_PROVIDER_TYPE.into(),
                model: None,
            },
        }
    }

    /// Loads configuration from environment variables, falling back to
    /// [`defaults`](Self::defaults) for anything unset, then validates every
    /// range and provider type.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::defaults();

        if let Ok(v) = std::env::var("NAVIGATOR_MAX_TURNS") {
            config.navigator_max_turns = parse_u32("NAVIGATOR_MAX_TURNS", &v)?;
        }
        if let Ok(v) = std::env::var("DRIVER_MAX_TURNS") {
            config.driver_max_turns = parse_u32("DRIVER_MAX_TURNS", &v)?;
        }
        if let Ok(v) = std::env::var("MAX_PROMPT_LENGTH") {
            config.max_prompt_length = parse_usize("MAX_PROMPT_LENGTH", &v)?;
        }
        if let Ok(v) = std::env::var("MAX_PROMPT_FILE_SIZE") {
            config.max_prompt_file_size = parse_usize("MAX_PROMPT_FILE_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("SESSION_HARD_LIMIT_SECS") {
            let secs = parse_u64("SESSION_HARD_LIMIT_SECS", &v)?;
            config.session_hard_limit = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("TOOL_COMPLETION_TIMEOUT_SECS") {
            let secs = parse_u64("TOOL_COMPLETION_TIMEOUT_SECS", &v)?;
            config.tool_completion_timeout = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("PERMISSION_REQUEST_TIMEOUT_SECS") {
            let secs = parse_u64("PERMISSION_REQUEST_TIMEOUT_SECS", &v)?;
            config.permission_request_timeout = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("ARCHITECT_PROVIDER_TYPE") {
            config.architect.provider_type = v;
        }
        if let Ok(v) = std::env::var("NAVIGATOR_PROVIDER_TYPE") {
            config.navigator.provider_type = v;
        }
        if let Ok(v) = std::env::var("DRIVER_PROVIDER_TYPE") {
            config.driver.provider_type = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !NAVIGATOR_MAX_TURNS_RANGE.contains(&self.navigator_max_turns) {
            return Err(ValidationError::OutOfRange {
                field: "navigator_max_turns",
                reason: format!(
                    "must be in {}..={}",
                    NAVIGATOR_MAX_TURNS_RANGE.start(),
                    NAVIGATOR_MAX_TURNS_RANGE.end()
                ),
            });
        }
        if !DRIVER_MAX_TURNS_RANGE.contains(&self.driver_max_turns) {
            return Err(ValidationError::OutOfRange {
                field: "driver_max_turns",
                reason: format!(
                    "must be in {}..={}",
                    DRIVER_MAX_TURNS_RANGE.start(),
                    DRIVER_MAX_TURNS_RANGE.end()
                ),
            });
        }
        if !MAX_PROMPT_LENGTH_RANGE.contains(&self.max_prompt_length) {
            return Err(ValidationError::OutOfRange {
                field: "max_prompt_length",
                reason: format!(
                    "must be in {}..={}",
                    MAX_PROMPT_LENGTH_RANGE.start(),
                    MAX_PROMPT_LENGTH_RANGE.end()
                ),
            });
        }
        if !MAX_PROMPT_FILE_SIZE_RANGE.contains(&self.max_prompt_file_size) {
            return Err(ValidationError::OutOfRange {
                field: "max_prompt_file_size",
                reason: format!(
                    "must be in {}..={} bytes",
                    MAX_PROMPT_FILE_SIZE_RANGE.start(),
                    MAX_PROMPT_FILE_SIZE_RANGE.end()
                ),
            });
        }
        if !SESSION_HARD_LIMIT_RANGE.contains(&self.session_hard_limit) {
            return Err(ValidationError::OutOfRange {
                field: "session_hard_limit",
                reason: "must be between 1 minute and 8 hours".into(),
            });
        }
        if !TOOL_COMPLETION_TIMEOUT_RANGE.contains(&self.tool_completion_timeout) {
            return Err(ValidationError::OutOfRange {
                field: "tool_completion_timeout",
                reason: "must be between 1 second and 30 minutes".into(),
            });
        }
        if !PERMISSION_REQUEST_TIMEOUT_RANGE.contains(&self.permission_request_timeout) {
            return Err(ValidationError::OutOfRange {
                field: "permission_request_timeout",
                reason: "must be between 1 second and 10 minutes".into(),
            });
        }
        self.architect.validate("architect")?;
        self.navigator.validate("navigator")?;
        self.driver.validate("driver")?;
        Ok(())
    }
}

fn parse_u32(field: &'static str, raw: &str) -> Result<u32, ValidationError> {
    raw.parse().map_err(|_| ValidationError::OutOfRange {
        field,
        reason: format!("`{raw}` is not a valid integer"),
    })
}

fn parse_u64(field: &'static str, raw: &str) -> Result<u64, ValidationError> {
    raw.parse().map_err(|_| ValidationError::OutOfRange {
        field,
        reason: format!("`{raw}` is not a valid integer"),
    })
}

fn parse_usize(field: &'static str, raw: &str) -> Result<usize, ValidationError> {
    raw.parse().map_err(|_| ValidationError::OutOfRange {
        field,
        reason: format!("`{raw}` is not a valid integer"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(OrchestratorConfig::defaults().validate().is_ok());
    }

    #[test]
    fn test_driver_max_turns_out_of_range_rejected() {
        let mut config = OrchestratorConfig::defaults();
        config.driver_max_turns = 1000;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { field: "driver_max_turns", .. }));
    }

    #[test]
    fn test_unknown_provider_type_rejected() {
        let mut config = OrchestratorConfig::defaults();
        config.driver.provider_type = "anthropic".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::UnknownProviderType(_)));
    }

    #[test]
    fn test_session_hard_limit_bounds() {
        let mut config = OrchestratorConfig::defaults();
        config.session_hard_limit = Duration::from_secs(1);
        assert!(config.validate().is_err());
        config.session_hard_limit = Duration::from_secs(60 * 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tool_completion_timeout_out_of_range_rejected() {
        let mut config = OrchestratorConfig::defaults();
        config.tool_completion_timeout = Duration::from_secs(60 * 60);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange { field: "tool_completion_timeout", .. }
        ));
    }

    #[test]
    fn test_permission_request_timeout_out_of_range_rejected() {
        let mut config = OrchestratorConfig::defaults();
        config.permission_request_timeout = Duration::from_millis(0);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange { field: "permission_request_timeout", .. }
        ));
    }
}
