//! Test-only fixtures, enabled via the `test-support` feature.
//!
//! Grounded on the teacher's deleted `test_utils::EventCollector`: a shared,
//! clonable sink that records every event for later assertion instead of
//! requiring each test to thread its own channel through.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::DiagnosticEvent;

/// Collects [`DiagnosticEvent`]s emitted during a test run for later
/// assertion. Clone freely; all clones share the same backing log.
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: DiagnosticEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AgentRole;

    #[test]
    fn test_collects_and_counts_events() {
        let collector = EventCollector::new();
        collector.record(DiagnosticEvent::SessionCreated {
            agent: AgentRole::Driver,
        });
        collector.record(DiagnosticEvent::SessionCreated {
            agent: AgentRole::Navigator,
        });
        collector.record(DiagnosticEvent::DeadlineHit);

        assert_eq!(collector.count_kind("session_created"), 2);
        assert_eq!(collector.count_kind("deadline_hit"), 1);
        assert_eq!(collector.events().len(), 3);
    }

    #[test]
    fn test_clear_resets_collector() {
        let collector = EventCollector::new();
        collector.record(DiagnosticEvent::DeadlineHit);
        collector.clear();
        assert!(collector.events().is_empty());
    }
}
