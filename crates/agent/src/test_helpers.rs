//! Shared test helpers for loop tests.

use async_trait::async_trait;
use caregaps_core::error::ProviderError;
use caregaps_core::{
    Message, MessageToolCall, Provider, ProviderRequest, ProviderResponse, Tool, ToolPayload,
    ToolResult, ToolSpec, Usage,
};
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum Turn {
    Text(String),
    Call(MessageToolCall),
    Fail,
}

/// A mock provider that replays scripted turns in sequence.
///
/// Panics if more calls are made than turns provided, unless built with
/// [`ScriptedProvider::failing`].
pub struct ScriptedProvider {
    turns: Vec<Turn>,
    always_fail: bool,
    call_count: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            always_fail: false,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails.
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if self.always_fail {
            return Err(ProviderError::Network("connection reset".into()));
        }

        let turn = self.turns.get(n).cloned().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more turns (call #{n}, have {})",
                self.turns.len()
            )
        });
        let message = match turn {
            Turn::Text(text) => Message::assistant(text),
            Turn::Call(call) => Message::tool_request("", call),
            Turn::Fail => {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "internal error".into(),
                });
            }
        };
        Ok(ProviderResponse {
            message,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// Helper to create a tool call.
pub fn tool_call(name: &str, arguments: &str) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

/// A tool that returns `rows` synthetic gap records and counts its calls.
pub struct CountingTool {
    spec: ToolSpec,
    rows: usize,
    calls: AtomicUsize,
}

impl CountingTool {
    pub fn records(alias: &str, required: &[&str], rows: usize) -> Arc<Self> {
        let properties: Map<String, Value> = required
            .iter()
            .map(|p| (p.to_string(), json!({ "type": "string" })))
            .collect();
        let spec = ToolSpec::new(
            alias,
            alias.replace("__", "."),
            "Synthetic care gaps",
            json!({ "type": "object", "properties": properties, "required": required }),
        );
        Arc::new(Self {
            spec,
            rows,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _arguments: Map<String, Value>) -> ToolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rows = (0..self.rows)
            .map(|i| {
                json!({
                    "patient_name": format!("P*** {i}***"),
                    "gap_type": "Influenza Vaccine",
                    "days_open": 100 + i,
                })
                .as_object()
                .cloned()
                .unwrap_or_default()
            })
            .collect();
        ToolResult::success(ToolPayload::Records(rows))
    }
}
