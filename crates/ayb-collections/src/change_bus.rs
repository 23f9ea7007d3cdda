//! Post-commit change-event bus (§4.4.7, §9). Bounded broadcast channel;
//! slow subscribers (the webhook dispatcher) fall behind the ring buffer
//! rather than block publishers, and an overflow backlog table is the
//! correctness backstop when they fall behind far enough to miss events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    pub schema: String,
    pub table: String,
    pub primary_key: Value,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub at: DateTime<Utc>,
}

const BUS_CAPACITY: usize = 1024;

/// Wraps a `tokio::sync::broadcast` sender. Cloning a [`ChangeBus`] clones
/// the sender handle, which is how every collections handler and the
/// webhook dispatcher share the same bus without a shared-state wrapper.
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Emission failure (no subscribers, or a send error) is logged and
    /// swallowed — a dispatch failure must never fail the request that
    /// produced the event (§4.4.7).
    pub fn publish(&self, event: ChangeEvent) {
        if let Err(err) = self.sender.send(event) {
            tracing::debug!(error = %err, "change event had no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> ChangeEvent {
        ChangeEvent {
            action: ChangeAction::Create,
            schema: "public".to_string(),
            table: "posts".to_string(),
            primary_key: json!({"id": 1}),
            before: None,
            after: Some(json!({"id": 1, "title": "hi"})),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();
        bus.publish(sample_event());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.table, "posts");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = ChangeBus::new();
        bus.publish(sample_event());
    }

    #[test]
    fn action_as_str_matches_wire_format() {
        assert_eq!(ChangeAction::Create.as_str(), "create");
        assert_eq!(ChangeAction::Update.as_str(), "update");
        assert_eq!(ChangeAction::Delete.as_str(), "delete");
    }
}
