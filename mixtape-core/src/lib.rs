//! # Mixtape
//!
//! The orchestration core for a three-agent pair-programming session: an
//! Architect that plans, a Driver that implements, and a Navigator that
//! reviews the Driver's work and adjudicates its file-modification
//! permission requests.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mixtape_core::config::OrchestratorConfig;
//! use mixtape_core::orchestrator::{AgentProviders, Orchestrator};
//! use mixtape_core::provider::mock::MockProviderPort;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> mixtape_core::error::Result<()> {
//!     let config = OrchestratorConfig::from_env()
//!         .map_err(|e| mixtape_core::error::Error::Validation(e.to_string()))?;
//!     let providers = AgentProviders {
//!         architect: Arc::new(MockProviderPort::new()),
//!         navigator: Arc::new(MockProviderPort::new()),
//!         driver: Arc::new(MockProviderPort::new()),
//!     };
//!     let orchestrator = Orchestrator::new(config, providers, None);
//!     let outcome = orchestrator.run("Add a hello function").await?;
//!     println!("{}", outcome.final_driver_text);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Map
//!
//! - [`message`] — the normalized envelope every provider session speaks.
//! - [`provider`] — the `ProviderPort`/`AgentSession`/`StreamingSession` seam.
//! - [`mcp_bridge`] — the named decision/control tools agents call.
//! - [`architect`], [`driver`], [`navigator`] — the three agent roles.
//! - [`permission`] — routes file-modification permission requests between
//!   the Driver's provider and the Navigator.
//! - [`orchestrator`] — wires the roles together into one session.
//! - [`config`] — environment-driven, range-validated configuration.
//! - [`events`], [`diagnostic_log`] — structured diagnostics, persisted as
//!   JSONL.
//! - [`tool_tracker`] — pending/resolved tool-call bookkeeping shared by the
//!   Driver and Navigator.
//!
//! ## Feature Flags
//!
//! - `test-support` — exposes [`test_support`], fixtures for integration
//!   tests in downstream crates.

pub mod architect;
pub mod config;
pub mod diagnostic_log;
pub mod driver;
pub mod error;
pub mod events;
pub mod mcp_bridge;
pub mod message;
pub mod navigator;
pub mod orchestrator;
pub mod permission;
pub mod provider;
pub mod tool_tracker;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use events::{AgentRole, DiagnosticEvent, ShutdownPhase};
pub use message::{AgentMessage, ContentItem, DriverCommand, NavigatorCommand};
pub use orchestrator::{AgentProviders, Orchestrator, OrchestratorOutcome};
pub use permission::{NavigatorDecision, PermissionCoordinator, PermissionError, PermissionRequest};
pub use provider::{AgentSession, CanUseTool, ProviderError, ProviderPort, StreamingSession, ToolPermission};
