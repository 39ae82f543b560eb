//! Routes permission requests from the Driver to the Navigator and matches
//! asynchronous Navigator decisions back to the originating request.
//!
//! Grounded on the teacher's `request_authorization` flow (a pending map
//! keyed by request id, a oneshot channel per request, `tokio::time::timeout`
//! wrapping the await, cleanup on completion), generalized from a single
//! in-process authorizer to cross-session request/response routing between
//! two independent agent sessions.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::{DiagnosticEvent, EventSink};
use crate::message::NavigatorCommand;

/// A file-modification permission request raised by the Driver's provider.
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    pub request_id: Uuid,
    pub driver_transcript: String,
    pub tool_name: String,
    pub input: Value,
    pub tool_id: Option<String>,
}

/// The Navigator's resolution of a [`PermissionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum NavigatorDecision {
    Allow { updated_input: Option<Value> },
    Deny { reason: String },
}

/// All the ways a permission request can fail to resolve cleanly. Every
/// variant collapses to a single `{allowed: false, reason}` from the
/// Driver's point of view (see [`PermissionError::as_denial_reason`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PermissionError {
    #[error("permission request timed out")]
    Timeout,
    #[error("navigator produced a malformed response (no decision)")]
    Malformed,
    #[error("permission request was cancelled")]
    Cancelled,
    #[error("navigator session error: {0}")]
    NavigatorSession(String),
}

impl PermissionError {
    /// The prose reason surfaced to the Driver's provider on denial.
    pub fn as_denial_reason(&self) -> String {
        match self {
            PermissionError::Timeout => "Permission request timed out".to_string(),
            PermissionError::Malformed => {
                "Navigator produced no decision for this request".to_string()
            }
            PermissionError::Cancelled => "Permission request was cancelled".to_string(),
            PermissionError::NavigatorSession(msg) => format!("navigator session error: {msg}"),
        }
    }
}

/// Callback the orchestrator injects so the coordinator can deliver a
/// permission prompt into the Navigator's input stream without the
/// coordinator knowing anything about sessions.
pub type PermissionSink = Arc<dyn Fn(PermissionRequest) + Send + Sync>;

struct PendingEntry {
    request: PermissionRequest,
    resolver: oneshot::Sender<Result<NavigatorDecision, PermissionError>>,
}

/// Routes permission requests to the Navigator and matches decisions back by
/// request-id (falling back to oldest-pending for navigators that omit it).
pub struct PermissionCoordinator {
    // Insertion-ordered: index 0 is the oldest pending request.
    pending: Mutex<Vec<PendingEntry>>,
    sink: PermissionSink,
    events: Mutex<Option<EventSink>>,
}

impl PermissionCoordinator {
    pub fn new(sink: PermissionSink) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            sink,
            events: Mutex::new(None),
        }
    }

    /// Installs the diagnostic event sink. Optional: requests and decisions
    /// are tracked and dispatched identically whether or not one is set.
    pub fn set_event_sink(&self, sink: EventSink) {
        *self.events.lock() = Some(sink);
    }

    fn emit(&self, event: DiagnosticEvent) {
        if let Some(sink) = self.events.lock().as_ref() {
            sink(event);
        }
    }

    /// Submit a request, dispatch it to the Navigator, and await the
    /// decision. Resolves with `Err` on timeout or cancellation; never
    /// panics or blocks past `timeout` + a small epsilon.
    pub async fn request(
        &self,
        req: PermissionRequest,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<NavigatorDecision, PermissionError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            pending.push(PendingEntry {
                request: req.clone(),
                resolver: tx,
            });
        }
        self.emit(DiagnosticEvent::PermissionRequested {
            request_id: req.request_id.to_string(),
            tool_name: req.tool_name.clone(),
        });

        (self.sink)(req.clone());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.remove(&req.request_id);
                Err(PermissionError::Cancelled)
            }
            _ = tokio::time::sleep(timeout) => {
                self.remove(&req.request_id);
                self.emit(DiagnosticEvent::PermissionTimeout {
                    request_id: req.request_id.to_string(),
                });
                Err(PermissionError::Timeout)
            }
            result = rx => {
                match result {
                    Ok(decision) => decision,
                    // Resolver dropped without sending: treat as cancelled.
                    Err(_) => Err(PermissionError::Cancelled),
                }
            }
        }
    }

    /// Called from the Navigator's message-processing loop when an
    /// approve/deny decision tool completes.
    pub fn submit_decision(&self, cmd: NavigatorCommand) {
        let (request_id, decision) = match cmd {
            NavigatorCommand::Approve {
                request_id,
                comment: _,
            } => (
                request_id,
                NavigatorDecision::Allow {
                    updated_input: None,
                },
            ),
            NavigatorCommand::Deny { request_id, comment } => (
                request_id,
                NavigatorDecision::Deny {
                    reason: comment.unwrap_or_else(|| "denied".to_string()),
                },
            ),
            NavigatorCommand::CodeReview { .. } => return,
        };

        let mut pending = self.pending.lock();
        let index = match request_id.as_deref() {
            Some(id) => pending
                .iter()
                .position(|entry| entry.request.request_id.to_string() == id),
            None => None,
        };
        // Fall back to the oldest pending entry when the id is absent or
        // doesn't match anything outstanding.
        let index = index.or_else(|| if pending.is_empty() { None } else { Some(0) });

        match index {
            Some(i) => {
                let entry = pending.remove(i);
                let allowed = matches!(decision, NavigatorDecision::Allow { .. });
                self.emit(DiagnosticEvent::PermissionResolved {
                    request_id: entry.request.request_id.to_string(),
                    allowed,
                });
                let _ = entry.resolver.send(Ok(decision));
            }
            None => {
                tracing::warn!(?request_id, "orphaned navigator decision, no pending request");
            }
        }
    }

    /// Called when the Navigator completes a batch with zero decisions
    /// while requests are outstanding.
    pub fn handle_malformed(&self) {
        let mut pending = self.pending.lock();
        for entry in pending.drain(..) {
            let _ = entry.resolver.send(Err(PermissionError::Malformed));
        }
    }

    /// Rejects all pending requests with cancellation. Safe to call more
    /// than once.
    pub fn cleanup(&self) {
        let mut pending = self.pending.lock();
        for entry in pending.drain(..) {
            let _ = entry.resolver.send(Err(PermissionError::Cancelled));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn remove(&self, request_id: &Uuid) {
        let mut pending = self.pending.lock();
        pending.retain(|entry| &entry.request.request_id != request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_request(id: Uuid) -> PermissionRequest {
        PermissionRequest {
            request_id: id,
            driver_transcript: "transcript".into(),
            tool_name: "Write".into(),
            input: serde_json::json!({"file_path": "hello.ts"}),
            tool_id: Some("tool_1".into()),
        }
    }

    #[tokio::test]
    async fn test_request_resolved_by_matching_id() {
        let sent = Arc::new(AtomicUsize::new(0));
        let sent_clone = sent.clone();
        let coordinator = Arc::new(PermissionCoordinator::new(Arc::new(move |_req| {
            sent_clone.fetch_add(1, Ordering::SeqCst);
        })));

        let id = Uuid::new_v4();
        let coord = coordinator.clone();
        let handle = tokio::spawn(async move {
            coord
                .request(sample_request(id), Duration::from_secs(2), CancellationToken::new())
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.submit_decision(NavigatorCommand::Approve {
            request_id: Some(id.to_string()),
            comment: None,
        });

        let decision = handle.await.unwrap().unwrap();
        assert_eq!(decision, NavigatorDecision::Allow { updated_input: None });
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oldest_pending_fallback() {
        let coordinator = Arc::new(PermissionCoordinator::new(Arc::new(|_req| {})));
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();

        let coord_a = coordinator.clone();
        let a = tokio::spawn(async move {
            coord_a
                .request(sample_request(id_a), Duration::from_secs(2), CancellationToken::new())
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let coord_b = coordinator.clone();
        let b = tokio::spawn(async move {
            coord_b
                .request(sample_request(id_b), Duration::from_secs(2), CancellationToken::new())
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // No request_id: resolves the oldest pending (id_a).
        coordinator.submit_decision(NavigatorCommand::Approve {
            request_id: None,
            comment: None,
        });

        let a_result = a.await.unwrap();
        assert!(a_result.is_ok());
        assert_eq!(coordinator.pending_count(), 1);

        coordinator.submit_decision(NavigatorCommand::Deny {
            request_id: Some(id_b.to_string()),
            comment: Some("no".into()),
        });
        let b_result = b.await.unwrap().unwrap();
        assert_eq!(b_result, NavigatorDecision::Deny { reason: "no".into() });
    }

    #[tokio::test]
    async fn test_timeout_denies() {
        let coordinator = PermissionCoordinator::new(Arc::new(|_req| {}));
        let err = coordinator
            .request(
                sample_request(Uuid::new_v4()),
                Duration::from_millis(20),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, PermissionError::Timeout);
        assert_eq!(err.as_denial_reason(), "Permission request timed out");
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_denies() {
        let coordinator = Arc::new(PermissionCoordinator::new(Arc::new(|_req| {})));
        let cancel = CancellationToken::new();
        let coord = coordinator.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            coord
                .request(sample_request(Uuid::new_v4()), Duration::from_secs(5), cancel_clone)
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err, PermissionError::Cancelled);
    }

    #[tokio::test]
    async fn test_handle_malformed_rejects_all_pending() {
        let coordinator = Arc::new(PermissionCoordinator::new(Arc::new(|_req| {})));
        let coord = coordinator.clone();
        let handle = tokio::spawn(async move {
            coord
                .request(sample_request(Uuid::new_v4()), Duration::from_secs(5), CancellationToken::new())
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.handle_malformed();
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err, PermissionError::Malformed);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let coordinator = PermissionCoordinator::new(Arc::new(|_req| {}));
        coordinator.cleanup();
        coordinator.cleanup();
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_orphaned_decision_is_discarded() {
        let coordinator = PermissionCoordinator::new(Arc::new(|_req| {}));
        // No pending requests; should not panic.
        coordinator.submit_decision(NavigatorCommand::Approve {
            request_id: Some(Uuid::new_v4().to_string()),
            comment: None,
        });
        assert_eq!(coordinator.pending_count(), 0);
    }
}
