//! Audit logging — the receiving end of the observability sink.
//!
//! The logger subscribes to the [`EventBus`], keeps a bounded in-memory
//! history of records and forwards each one to its sinks.

use caregaps_core::{DomainEvent, ErrorKind, EventBus};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Default number of records kept in memory.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Trait for audit log sinks (where records are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &DomainEvent);
}

/// In-memory audit logger with pluggable sinks.
pub struct AuditLogger {
    entries: Mutex<VecDeque<DomainEvent>>,
    capacity: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_CAPACITY,
            sinks,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DomainEvent>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one event: store it, then forward it to every sink.
    pub fn log(&self, event: DomainEvent) {
        for sink in &self.sinks {
            sink.record(&event);
        }

        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Subscribe to `bus` and record everything published on it until the
    /// bus is dropped.
    pub fn listen(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.log(event.as_ref().clone()),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Audit logger fell behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Get all recorded entries, oldest first.
    pub fn entries(&self) -> Vec<DomainEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Get error records of one kind.
    pub fn errors_of_kind(&self, kind: ErrorKind) -> Vec<DomainEvent> {
        self.lock()
            .iter()
            .filter(|e| matches!(e, DomainEvent::ErrorOccurred { kind: k, .. } if *k == kind))
            .cloned()
            .collect()
    }

    /// Clear all stored entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// A tracing-based audit sink.
///
/// Error records go out at `error`/`warn` level, everything else at `info`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, event: &DomainEvent) {
        match event {
            DomainEvent::ErrorOccurred {
                kind,
                message,
                context,
                ..
            } => {
                let context = serde_json::Value::Object(context.clone());
                match kind {
                    ErrorKind::MaxIterations
                    | ErrorKind::LlmCallError
                    | ErrorKind::FunctionException => {
                        tracing::error!(kind = %kind, %context, "{message}");
                    }
                    _ => tracing::warn!(kind = %kind, %context, "{message}"),
                }
            }
            DomainEvent::ToolExecuted {
                tool_name,
                success,
                duration_ms,
                ..
            } => {
                tracing::info!(tool = %tool_name, success, duration_ms, "Function executed");
            }
            DomainEvent::QueryCompleted {
                query,
                functions,
                success,
                error,
                model,
                ..
            } => {
                tracing::info!(
                    query = %query,
                    functions = ?functions,
                    success,
                    error = ?error,
                    model = %model,
                    "Query completed"
                );
            }
        }
    }
}
