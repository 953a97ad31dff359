//! Domain event system — the observability sink.
//!
//! Components publish structured records here instead of writing to a log
//! directly. Subscribers (the audit logger in particular) decide where the
//! records end up. Publishing never fails and never blocks the request.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A classified failure with its context (function name, arguments, ...)
    ErrorOccurred {
        kind: ErrorKind,
        message: String,
        context: Map<String, Value>,
        timestamp: DateTime<Utc>,
    },

    /// A data function was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// One request finished, successfully or not
    QueryCompleted {
        query: String,
        functions: Vec<String>,
        success: bool,
        error: Option<String>,
        model: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Build an `ErrorOccurred` record stamped with the current time.
    pub fn error(kind: ErrorKind, message: impl Into<String>, context: Map<String, Value>) -> Self {
        Self::ErrorOccurred {
            kind,
            message: message.into(),
            context,
            timestamp: Utc::now(),
        }
    }
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

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
