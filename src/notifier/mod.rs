//! Notification collaborator
//!
//! Fire-and-forget, at-least-once. The core never consumes a return value
//! and callers must tolerate duplicate notifications; a failed delivery is
//! logged, never propagated into a booking or payment operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Recipient role for a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Freelancer,
    Owner,
}

/// Notification event types emitted by the core
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BookingCreated,
    BookingCancelled,
    BookingRescheduled,
    AssignmentRequested,
    AssignmentClaimed,
    AssignmentOffered,
    AssignmentAccepted,
    AssignmentRejected,
    NoFreelancers,
    PaymentCaptured,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, role: Role, event: EventType, payload: serde_json::Value);
}

/// Notifier that writes structured log lines. Stands in for the external
/// email/SMS delivery service, which is out of scope for the core.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, role: Role, event: EventType, payload: serde_json::Value) {
        tracing::info!(?role, ?event, %payload, "notification dispatched");
    }
}

/// Test notifier that records every dispatched event.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(Role, EventType, serde_json::Value)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, role: Role, event: EventType, payload: serde_json::Value) {
        self.events.lock().unwrap().push((role, event, payload));
    }
}

impl RecordingNotifier {
    pub fn count_of(&self, event: EventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _)| *e == event)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_recording_notifier_counts_events() {
        let notifier = RecordingNotifier::default();
        notifier
            .notify(Role::Owner, EventType::BookingCreated, json!({"id": 1}))
            .await;
        notifier
            .notify(Role::Customer, EventType::BookingCreated, json!({"id": 1}))
            .await;
        notifier
            .notify(Role::Owner, EventType::NoFreelancers, json!({}))
            .await;

        assert_eq!(notifier.count_of(EventType::BookingCreated), 2);
        assert_eq!(notifier.count_of(EventType::NoFreelancers), 1);
        assert_eq!(notifier.count_of(EventType::AssignmentClaimed), 0);
    }
}
