//! Per-agent bookkeeping of in-flight tool calls.
//!
//! Grounded on the pending-map pattern the teacher uses for authorization
//! bookkeeping (a synchronized map keyed by tool-use id), but scoped to
//! readiness tracking rather than permission state — permission state lives
//! in [`crate::permission::PermissionCoordinator`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::error::Error;
use crate::events::{AgentRole, DiagnosticEvent, EventSink};

/// A tool-use id observed in an assistant message, not yet resolved.
#[derive(Debug, Clone)]
pub struct PendingTool {
    pub name: String,
    pub input: Value,
    pub emitted_at: Instant,
}

struct Inner {
    pending: Mutex<HashMap<String, PendingTool>>,
    notify: Notify,
    events: Mutex<Option<(AgentRole, EventSink)>>,
}

/// Tracks in-flight tool calls for one agent session.
///
/// `waitForDrain` waiters are released atomically: every task blocked on
/// [`ToolTracker::wait_for_drain`] wakes in the same tick the pending count
/// transitions to zero, because `Notify::notify_waiters` fires all of them
/// rather than a single one.
#[derive(Clone)]
pub struct ToolTracker {
    inner: Arc<Inner>,
}

impl Default for ToolTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                notify: Notify::new(),
                events: Mutex::new(None),
            }),
        }
    }

    /// Installs the diagnostic event sink, attributing every event this
    /// tracker emits to `agent`. Optional: bookkeeping behaves identically
    /// whether or not one is set.
    pub fn set_event_sink(&self, agent: AgentRole, sink: EventSink) {
        *self.inner.events.lock() = Some((agent, sink));
    }

    /// Record a tool-use id as pending, observed from an assistant *ToolUse*.
    pub fn mark_pending(&self, id: impl Into<String>, name: impl Into<String>, input: Value) {
        let id = id.into();
        let name = name.into();
        self.inner.pending.lock().insert(
            id.clone(),
            PendingTool {
                name: name.clone(),
                input,
                emitted_at: Instant::now(),
            },
        );
        if let Some((agent, sink)) = self.inner.events.lock().as_ref() {
            sink(DiagnosticEvent::ToolPending {
                agent: *agent,
                tool_use_id: id,
                tool_name: name,
            });
        }
    }

    /// Resolve a tool-use id, observed from a user *ToolResult* with a
    /// matching id. Returns the resolved entry, if it was pending.
    ///
    /// Wakes every `wait_for_drain` waiter iff this was the last pending
    /// entry.
    pub fn mark_resolved(&self, id: &str) -> Option<PendingTool> {
        let mut guard = self.inner.pending.lock();
        let resolved = guard.remove(id);
        let drained = guard.is_empty();
        drop(guard);
        if drained {
            self.inner.notify.notify_waiters();
        }
        if resolved.is_some() {
            if let Some((agent, sink)) = self.inner.events.lock().as_ref() {
                sink(DiagnosticEvent::ToolResolved {
                    agent: *agent,
                    tool_use_id: id.to_string(),
                });
            }
        }
        resolved
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.pending.lock().contains_key(id)
    }

    /// Block until `pending_count()` reaches zero, or `timeout` elapses.
    ///
    /// Returns `Err(Error::ToolTimeout)` on expiry; the caller must then
    /// interrupt the session.
    pub async fn wait_for_drain(&self, timeout: Duration) -> Result<(), Error> {
        if self.pending_count() == 0 {
            return Ok(());
        }
        let notified = self.inner.notify.notified();
        // Re-check after subscribing: avoids missing a notification fired
        // between the first check above and `notified()` registering.
        if self.pending_count() == 0 {
            return Ok(());
        }
        match tokio::time::timeout(timeout, notified).await {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::ToolTimeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_pending_and_resolved() {
        let tracker = ToolTracker::new();
        tracker.mark_pending("1", "write", serde_json::json!({}));
        assert_eq!(tracker.pending_count(), 1);
        assert!(tracker.is_pending("1"));

        let resolved = tracker.mark_resolved("1").unwrap();
        assert_eq!(resolved.name, "write");
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_resolve_unknown_id_is_noop() {
        let tracker = ToolTracker::new();
        assert!(tracker.mark_resolved("missing").is_none());
    }

    #[tokio::test]
    async fn test_wait_for_drain_returns_immediately_when_empty() {
        let tracker = ToolTracker::new();
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_for_drain(Duration::from_secs(1)))
            .await
            .expect("should not time out")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_drain_wakes_on_resolve() {
        let tracker = ToolTracker::new();
        tracker.mark_pending("1", "write", serde_json::json!({}));

        let waiter_tracker = tracker.clone();
        let waiter = tokio::spawn(async move { waiter_tracker.wait_for_drain(Duration::from_secs(2)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.mark_resolved("1");

        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_drain_releases_all_concurrent_waiters() {
        let tracker = ToolTracker::new();
        tracker.mark_pending("1", "write", serde_json::json!({}));

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let t = tracker.clone();
            waiters.push(tokio::spawn(async move {
                t.wait_for_drain(Duration::from_secs(2)).await
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.mark_resolved("1");

        for w in waiters {
            w.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_for_drain_times_out() {
        let tracker = ToolTracker::new();
        tracker.mark_pending("1", "write", serde_json::json!({}));

        let err = tracker.wait_for_drain(Duration::from_millis(30)).await.unwrap_err();
        assert!(err.is_tool_timeout());
    }
}
