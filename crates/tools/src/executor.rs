//! Function executor — one registered tool per catalog function.
//!
//! A [`FunctionTool`] forwards a call to the function service under its
//! namespaced identifier, bounds it with a wall-clock timeout, masks the
//! result when privacy masking is on and normalizes it into a
//! [`ToolPayload`]. Nothing here ever returns an `Err`: every failure ends up
//! as a [`ToolResult::Failure`] carrying the text the model will see.

use crate::service::{FunctionOutcome, FunctionService, ServiceError};
use async_trait::async_trait;
use caregaps_core::{DomainEvent, ErrorKind, EventBus, Tool, ToolPayload, ToolResult, ToolSpec};
use caregaps_security::PhiMasker;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_FUNCTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by every tool built from one catalog.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub masking: bool,
    pub timeout: Duration,
    pub events: Arc<EventBus>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            masking: false,
            timeout: DEFAULT_FUNCTION_TIMEOUT,
            events: Arc::new(EventBus::default()),
        }
    }
}

pub struct FunctionTool {
    spec: ToolSpec,
    service: Arc<dyn FunctionService>,
    masker: Option<PhiMasker>,
    timeout: Duration,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.spec.name)
            .field("qualified_name", &self.spec.qualified_name)
            .field("masking", &self.masker.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FunctionTool {
    pub fn new(spec: ToolSpec, service: Arc<dyn FunctionService>, options: &ExecutorOptions) -> Self {
        Self {
            spec,
            service,
            masker: options.masking.then(PhiMasker::new),
            timeout: options.timeout,
            events: options.events.clone(),
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.spec.qualified_name
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<FunctionOutcome, ServiceError> {
        match tokio::time::timeout(
            self.timeout,
            self.service.execute(&self.spec.qualified_name, arguments),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.timeout.as_secs())),
        }
    }

    fn report(&self, kind: ErrorKind, message: &str, arguments: Map<String, Value>) {
        tracing::warn!(
            function = %self.spec.qualified_name,
            kind = %kind,
            "{message}"
        );
        let mut context = Map::new();
        context.insert("function".into(), json!(self.spec.qualified_name));
        context.insert("arguments".into(), Value::Object(arguments));
        self.events
            .publish(DomainEvent::error(kind, message, context));
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Map<String, Value>) -> ToolResult {
        let started = Instant::now();
        let result = match self.call(&arguments).await {
            Ok(FunctionOutcome::Value(value)) => {
                let value = match &self.masker {
                    Some(masker) => masker.mask(value),
                    None => value,
                };
                ToolResult::success(ToolPayload::from_value(value))
            }
            Ok(FunctionOutcome::Error(error)) => {
                let message = format!("Error executing {}: {error}", self.spec.qualified_name);
                self.report(ErrorKind::FunctionExecutionError, &message, arguments);
                ToolResult::failure(message)
            }
            Err(e) => {
                let message = format!("Error: {e}");
                self.report(ErrorKind::FunctionException, &message, arguments);
                ToolResult::failure(message)
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            function = %self.spec.qualified_name,
            success = result.is_success(),
            duration_ms,
            "Function call finished"
        );
        self.events.publish(DomainEvent::ToolExecuted {
            tool_name: self.spec.qualified_name.clone(),
            success: result.is_success(),
            duration_ms,
            timestamp: Utc::now(),
        });
        result
    }
}
