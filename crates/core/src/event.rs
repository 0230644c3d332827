//! Domain event system: progress notifications for front-ends.
//!
//! The orchestrator publishes an event at each state transition so a
//! front-end can render the tool-call trace while a query is still running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::ToolErrorKind;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A query entered the orchestrator
    QueryStarted {
        conversation_id: String,
        query_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The reasoning capability replied
    ReasoningCompleted {
        conversation_id: String,
        iteration: u32,
        model: String,
        tool_requests: usize,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// A tool call finished (successfully or not)
    ToolExecuted {
        conversation_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        error_kind: Option<ToolErrorKind>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The query reached a terminal state
    QueryFinished {
        conversation_id: String,
        iterations: u32,
        /// `None` when a final answer was produced
        abort_reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolExecuted {
            conversation_id: "c".into(),
            tool_name: "search_indicators".into(),
            arguments: serde_json::json!({"query": "population"}),
            error_kind: None,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, error_kind, .. } => {
                assert_eq!(tool_name, "search_indicators");
                assert!(error_kind.is_none());
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::QueryFinished {
            conversation_id: "c".into(),
            iterations: 1,
            abort_reason: Some("no subscribers".into()),
            timestamp: Utc::now(),
        });
    }
}
