//! Orchestration-level diagnostic events.
//!
//! Grounded on the teacher's `AgentEvent`/`AgentHook` instinct (treat every
//! state transition as an observable event), but rescoped: the teacher's
//! enum described a single agent's run lifecycle; this one describes the
//! orchestrator's session, tool, permission, review, and shutdown
//! transitions, and is serde-serializable so it can be appended as JSONL by
//! [`crate::diagnostic_log`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A fire-and-forget sink for diagnostic events, injected into components
/// (the permission coordinator, the tool trackers) that have no handle back
/// to the orchestrator's own `emit`.
pub type EventSink = Arc<dyn Fn(DiagnosticEvent) + Send + Sync>;

/// One orchestration-level state transition, persisted to the diagnostic
/// log and also usable as an in-memory assertion target in tests via
/// [`crate::test_support::EventCollector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    SessionCreated { agent: AgentRole },
    SessionEnded { agent: AgentRole },
    ToolPending { agent: AgentRole, tool_use_id: String, tool_name: String },
    ToolResolved { agent: AgentRole, tool_use_id: String },
    PermissionRequested { request_id: String, tool_name: String },
    PermissionResolved { request_id: String, allowed: bool },
    PermissionTimeout { request_id: String },
    ReviewCycleStarted,
    ReviewCycleFinished { pass: bool },
    DeadlineHit,
    ShutdownPhaseEntered { phase: ShutdownPhase },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Architect,
    Navigator,
    Driver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPhase {
    DisplayCleanup,
    AgentsStopped,
    McpClosed,
    ProvidersCleaned,
    LoggerClosed,
}

impl DiagnosticEvent {
    /// A short machine-readable label, used for `tracing` event names and
    /// test assertions (`EventCollector::count_event`).
    pub fn kind(&self) -> &'static str {
        match self {
            DiagnosticEvent::SessionCreated { .. } => "session_created",
            DiagnosticEvent::SessionEnded { .. } => "session_ended",
            DiagnosticEvent::ToolPending { .. } => "tool_pending",
            DiagnosticEvent::ToolResolved { .. } => "tool_resolved",
            DiagnosticEvent::PermissionRequested { .. } => "permission_requested",
            DiagnosticEvent::PermissionResolved { .. } => "permission_resolved",
            DiagnosticEvent::PermissionTimeout { .. } => "permission_timeout",
            DiagnosticEvent::ReviewCycleStarted => "review_cycle_started",
            DiagnosticEvent::ReviewCycleFinished { .. } => "review_cycle_finished",
            DiagnosticEvent::DeadlineHit => "deadline_hit",
            DiagnosticEvent::ShutdownPhaseEntered { .. } => "shutdown_phase_entered",
        }
    }
}
