//! Events emitted while an exchange runs.
//!
//! The agent loop and the memory store publish events as they work; the
//! gateway subscribes and logs them. Nothing in the core depends on anyone
//! listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A tool call was dispatched
    ToolDispatched {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A repeated identical tool call was refused
    CallSuppressed {
        tool_name: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent exchange ended
    ExchangeFinished {
        steps: usize,
        termination: String,
        timestamp: DateTime<Utc>,
    },

    /// A memory was stored, searched, or removed
    MemoryAccessed {
        operation: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Fan-out of [`DomainEvent`]s to any number of listeners.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Listeners that fall more than `capacity` events behind see `Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(Arc::new(event));
    }

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
    async fn subscriber_sees_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolDispatched {
            tool_name: "memory_search".into(),
            success: true,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolDispatched {
                tool_name, success, ..
            } => {
                assert_eq!(tool_name, "memory_search");
                assert!(success);
            }
            _ => panic!("Expected ToolDispatched event"),
        }
    }

    #[test]
    fn publishing_without_listeners_is_silent() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::MemoryAccessed {
            operation: "add".into(),
            count: 1,
            timestamp: Utc::now(),
        });
    }
}
