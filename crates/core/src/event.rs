//! Run events — progress and notices published by the engine for whatever
//! presentation layer is listening.
//!
//! Events are fire-and-forget: a run behaves the same with or without
//! subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How a single (session, query) pair was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Answered from a message field without a remote call
    Extracted,
    /// Answered by the completion service
    Completed,
    /// The completion service failed; the answer is a placeholder
    Failed,
    /// No request slot freed in time; the answer is a placeholder
    Skipped,
}

/// All events a run can publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Processing began; `is_processing` is now true
    RunStarted {
        sessions: usize,
        queries: usize,
        timestamp: DateTime<Utc>,
    },

    /// The scheduler moved on to a new session
    SessionStarted {
        session_id: String,
        index: usize,
        total: usize,
    },

    /// A remote call is about to be made after `delay` of pacing
    CallDispatched {
        session_id: String,
        query_name: String,
        delay: Duration,
        cooldown: Option<Duration>,
    },

    /// One (session, query) pair has its final value
    QueryResolved {
        session_id: String,
        query_name: String,
        resolution: Resolution,
    },

    /// Every query of the session has a value
    SessionFinished { session_id: String },

    /// User-facing notice, deduplicated per key by the engine
    Notice { key: String, message: String },

    /// Processing ended; `is_processing` is now false
    RunFinished {
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for run events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<RunEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: RunEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RunEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(RunEvent::QueryResolved {
            session_id: "s1".into(),
            query_name: "Topic".into(),
            resolution: Resolution::Extracted,
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            RunEvent::QueryResolved {
                query_name,
                resolution,
                ..
            } => {
                assert_eq!(query_name, "Topic");
                assert_eq!(*resolution, Resolution::Extracted);
            }
            _ => panic!("Expected QueryResolved event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(RunEvent::Notice {
            key: "rate_limit".into(),
            message: "no subscribers".into(),
        });
    }
}
