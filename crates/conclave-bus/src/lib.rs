#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-bus** - in-process publish/subscribe event fan-out
//!
//! Delivery is fire-and-forget: each subscription owns a single-event buffer, and a
//! subscription whose delivery fails (buffer full, or the receiving end dropped) is
//! closed and removed on the next publish. There is no replay and no persistence;
//! `conclave-store-core` is the durable record of state, this crate only carries live
//! notifications of it.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

//─────────────────────────────
//  Event shape
//─────────────────────────────

/// Topic taxonomy an [`Event`] may belong to (section 4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Boot/reconciliation-level notices.
    SystemEvent,
    /// Agent status transitions.
    AgentEvent,
    /// Task lifecycle transitions.
    TaskEvent,
    /// Execution lifecycle transitions (section 4.5).
    ExecutionEvent,
    /// Workflow-execution lifecycle transitions (section 4.6).
    WorkflowEvent,
}

impl Topic {
    /// The wire-format topic name, matching section 6's event contract.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemEvent => "system_event",
            Self::AgentEvent => "agent_event",
            Self::TaskEvent => "task_event",
            Self::ExecutionEvent => "execution_event",
            Self::WorkflowEvent => "workflow_event",
        }
    }
}

/// The reserved filter tag that matches every topic.
pub const WILDCARD_TAG: &str = "all";

/// A JSON-shaped event broadcast to subscribers, per the wire contract in section 6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// The topic this event belongs to.
    #[serde(rename = "type")]
    pub topic: Topic,
    /// Sub-discriminator (e.g. "started", "completed", "created").
    pub event_type: String,
    /// When the underlying state transition occurred.
    pub timestamp: DateTime<Utc>,
    /// Unique id for this broadcast, distinct from any entity id in the payload.
    pub broadcast_id: Uuid,
    /// When the bus accepted the event for delivery.
    pub server_timestamp: DateTime<Utc>,
    /// Entity-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Construct a new event, stamping `broadcast_id` and `server_timestamp`.
    pub fn new(topic: Topic, event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            topic,
            event_type: event_type.into(),
            timestamp: now,
            broadcast_id: Uuid::new_v4(),
            server_timestamp: now,
            payload,
        }
    }
}

//─────────────────────────────
//  Error types
//─────────────────────────────

/// Errors raised by [`EventBus`] operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus could not accept the event for publication.
    #[error("failed to publish event: {0}")]
    PublishFailed(String),
}

//─────────────────────────────
//  Subscription handle
//─────────────────────────────

/// A live handle to a subscription created via [`EventBus::subscribe`].
///
/// Dropping the handle is equivalent to unsubscribing: the next publish that targets
/// it will fail to deliver and the bus will prune it.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    /// This subscription's internal id (useful for logging, not for addressing).
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Await the next event delivered to this subscription. Returns `None` once the
    /// bus has dropped this subscription (e.g. during shutdown).
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

//─────────────────────────────
//  Event bus trait
//─────────────────────────────

/// In-process publish/subscribe fan-out.
pub trait EventBus: Send + Sync {
    /// Deliver `event` to every live subscription whose filter tags include the
    /// event's topic or [`WILDCARD_TAG`]. Fire-and-forget: a subscription that cannot
    /// accept the event is closed and removed.
    fn publish(&self, event: Event) -> Result<(), BusError>;

    /// Create a new subscription filtered to `filter_tags` (topic names or the
    /// wildcard). An empty set matches nothing.
    fn subscribe(&self, filter_tags: HashSet<String>) -> Subscription;

    /// Number of currently live subscriptions.
    fn subscriber_count(&self) -> usize;
}

//─────────────────────────────
//  In-memory implementation
//─────────────────────────────

struct Subscriber {
    tags: HashSet<String>,
    tx: mpsc::Sender<Event>,
}

/// Default, dependency-free [`EventBus`] implementation backed by per-subscriber
/// bounded channels. Each subscription's buffer holds exactly one event, matching
/// the "no backpressure beyond the single-event buffer" contract in section 4.1.
pub struct InMemoryBus {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self { subscribers: RwLock::new(HashMap::new()) }
    }
}

impl EventBus for InMemoryBus {
    fn publish(&self, event: Event) -> Result<(), BusError> {
        let topic = event.topic.as_str();
        let mut dead = Vec::new();
        {
            let subs = self
                .subscribers
                .read()
                .map_err(|_| BusError::PublishFailed("subscriber registry lock poisoned".to_string()))?;
            for (id, sub) in subs.iter() {
                if sub.tags.contains(topic) || sub.tags.contains(WILDCARD_TAG) {
                    if sub.tx.try_send(event.clone()).is_err() {
                        dead.push(*id);
                    }
                }
            }
        }
        if !dead.is_empty() {
            if let Ok(mut subs) = self.subscribers.write() {
                for id in dead {
                    subs.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn subscribe(&self, filter_tags: HashSet<String>) -> Subscription {
        let (tx, rx) = mpsc::channel(1);
        let id = Uuid::new_v4();
        if let Ok(mut subs) = self.subscribers.write() {
            subs.insert(id, Subscriber { tags: filter_tags, tx });
        }
        Subscription { id, rx }
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn delivers_to_matching_topic() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe(tags(&["execution_event"]));
        bus.publish(Event::new(Topic::ExecutionEvent, "started", serde_json::json!({}))).unwrap();
        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type, "started");
    }

    #[tokio::test]
    async fn wildcard_subscriber_receives_every_topic() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe(tags(&[WILDCARD_TAG]));
        bus.publish(Event::new(Topic::AgentEvent, "updated", serde_json::json!({}))).unwrap();
        let event = sub.recv().await.unwrap();
        assert_eq!(event.topic.as_str(), "agent_event");
    }

    #[tokio::test]
    async fn non_matching_subscriber_does_not_receive() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe(tags(&["task_event"]));
        bus.publish(Event::new(Topic::AgentEvent, "updated", serde_json::json!({}))).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_millis(20), sub.recv()).await;
        assert!(result.is_err(), "subscriber should not have received a non-matching event");
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_on_next_publish() {
        let bus = InMemoryBus::new();
        let sub = bus.subscribe(tags(&["system_event"]));
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        bus.publish(Event::new(Topic::SystemEvent, "boot", serde_json::json!({}))).unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_independently() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe(tags(&["workflow_event"]));
        let mut b = bus.subscribe(tags(&["workflow_event"]));
        bus.publish(Event::new(Topic::WorkflowEvent, "completed", serde_json::json!({"id": 1}))).unwrap();
        assert_eq!(a.recv().await.unwrap().event_type, "completed");
        assert_eq!(b.recv().await.unwrap().event_type, "completed");
    }
}
