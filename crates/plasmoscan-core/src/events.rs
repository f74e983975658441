//! Application event types and event bus for state-change notifications.
//!
//! Aggregates events from the session manager and the batch pipeline into a
//! single broadcast channel. Downstream consumers (UI shell, telemetry)
//! subscribe independently; a consumer that falls behind loses old events
//! rather than blocking producers.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::defaults;
use crate::models::UserRole;

/// Event emitted on the application bus.
///
/// Serialized as JSON with a `type` tag field, e.g.
/// `{"type":"SessionSignedIn","user_id":"...","role":"doctor"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// A credential or biometric login succeeded.
    SessionSignedIn { user_id: Uuid, role: UserRole },
    /// A persisted session was rehydrated at process start.
    SessionResumed { user_id: Uuid },
    /// The session was cleared; the actor is unauthenticated again.
    SessionSignedOut { user_id: Uuid },
    /// A user completed biometric enrollment.
    BiometricEnrolled { user_id: Uuid },
    /// A batch job started running.
    BatchStarted { job_id: Uuid, total: usize },
    /// One image's outcome was appended; `index` is 1-based completed count.
    BatchProgress {
        job_id: Uuid,
        index: usize,
        total: usize,
    },
    /// The batch reached Completed with all slots filled.
    BatchCompleted {
        job_id: Uuid,
        total: usize,
        positive: usize,
    },
    /// The batch was cancelled before completion.
    BatchCancelled { job_id: Uuid, completed: usize },
}

impl AppEvent {
    /// Dot-namespaced event name for log/UI routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionSignedIn { .. } => "session.signed_in",
            Self::SessionResumed { .. } => "session.resumed",
            Self::SessionSignedOut { .. } => "session.signed_out",
            Self::BiometricEnrolled { .. } => "session.biometric_enrolled",
            Self::BatchStarted { .. } => "batch.started",
            Self::BatchProgress { .. } => "batch.progress",
            Self::BatchCompleted { .. } => "batch.completed",
            Self::BatchCancelled { .. } => "batch.cancelled",
        }
    }
}

/// Broadcast bus for [`AppEvent`]s.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a bus with the given buffered capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Send failures (no subscribers) are ignored.
    pub fn emit(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(defaults::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let user_id = Uuid::new_v4();

        bus.emit(AppEvent::SessionSignedIn {
            user_id,
            role: UserRole::LabTechnician,
        });

        match rx.recv().await.unwrap() {
            AppEvent::SessionSignedIn { user_id: id, role } => {
                assert_eq!(id, user_id);
                assert_eq!(role, UserRole::LabTechnician);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let bus = EventBus::new(8);
        bus.emit(AppEvent::SessionSignedOut {
            user_id: Uuid::new_v4(),
        });
    }

    #[test]
    fn test_event_type_names() {
        let ev = AppEvent::BatchProgress {
            job_id: Uuid::new_v4(),
            index: 1,
            total: 3,
        };
        assert_eq!(ev.event_type(), "batch.progress");

        let ev = AppEvent::SessionResumed {
            user_id: Uuid::new_v4(),
        };
        assert_eq!(ev.event_type(), "session.resumed");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let ev = AppEvent::BatchCancelled {
            job_id: Uuid::nil(),
            completed: 2,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"BatchCancelled\""));
        assert!(json.contains("\"completed\":2"));
    }
}
