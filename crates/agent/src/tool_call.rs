//! Handling one tool-call request from the model.
//!
//! Every path ends in exactly one text for the tool-result message. The
//! executor is only reached with a resolved name and, when the tool declares
//! required parameters, a non-empty argument map.

use crate::formatter::shape_result;
use caregaps_core::{DomainEvent, ErrorKind, EventBus, MessageToolCall, Tool, ToolRegistry};
use caregaps_tools::alias_for;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Decoding artifacts some models leak into tool names, removed in order.
const NAME_ARTIFACTS: [&str; 6] = [
    "<|channel|>",
    "<|commentary|>",
    "commentary",
    "channel",
    "<|",
    "|>",
];

pub const FUNCTION_NOT_FOUND: &str = "Error: Function not found. Please rephrase your query.";

/// Outcome of handling one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Text of the tool-result message
    pub output: String,
    /// Namespaced identifier of the function, when the executor ran
    pub invoked: Option<String>,
}

impl Dispatch {
    fn rejected(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            invoked: None,
        }
    }
}

/// Strip decoding artifacts from a requested tool name.
///
/// `get_stats<|channel|>commentary` → `get_stats`. Clean names come back
/// unchanged.
pub fn repair_name(raw: &str) -> String {
    NAME_ARTIFACTS
        .iter()
        .fold(raw.to_string(), |name, artifact| name.replace(artifact, ""))
}

/// Parse the raw argument payload into a parameter map.
///
/// An empty payload means no arguments. Keys that are empty or whitespace
/// are dropped.
pub fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map
            .into_iter()
            .filter(|(key, _)| !key.trim().is_empty())
            .collect()),
        Ok(other) => Err(format!("arguments must be a JSON object, got {other}")),
        Err(e) => Err(e.to_string()),
    }
}

/// Resolves and runs tool-call requests against one registry.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    events: Arc<EventBus>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>, events: Arc<EventBus>) -> Self {
        Self { tools, events }
    }

    /// Look a name up as given, then as a flattened alias.
    fn resolve(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .get(name)
            .or_else(|| self.tools.get(&alias_for(name)))
    }

    pub async fn dispatch(&self, call: &MessageToolCall) -> Dispatch {
        let name = repair_name(&call.name);
        if name != call.name {
            tracing::warn!(raw = %call.name, repaired = %name, "Repaired tool name");
        }

        let arguments = match parse_arguments(&call.arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                self.report(
                    ErrorKind::ToolCallError,
                    &e,
                    json!({ "tool": call.name, "args": call.arguments }),
                );
                return Dispatch::rejected(format!("Error executing tool: {e}"));
            }
        };

        let Some(tool) = self.resolve(&name) else {
            self.report(
                ErrorKind::ToolNotFound,
                &format!("Function '{name}' not found"),
                json!({ "tool": name, "available": self.tools.len() }),
            );
            return Dispatch::rejected(FUNCTION_NOT_FOUND);
        };

        let spec = tool.spec();
        if arguments.is_empty() && !spec.required.is_empty() {
            let required = spec.required.join(", ");
            self.report(
                ErrorKind::ToolArgumentMissing,
                &format!("Function '{}' requires params: {required}", spec.name),
                json!({ "tool": spec.name, "required": spec.required }),
            );
            return Dispatch::rejected(format!(
                "Error: This function requires parameters. Please provide: {required}"
            ));
        }

        tracing::debug!(tool = %spec.name, args = arguments.len(), "Executing tool call");
        let result = tool.execute(arguments).await;
        Dispatch {
            output: shape_result(&result),
            invoked: Some(spec.qualified_name.clone()),
        }
    }

    fn report(&self, kind: ErrorKind, message: &str, context: Value) {
        tracing::warn!(kind = %kind, "{message}");
        let context = match context {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.events.publish(DomainEvent::error(kind, message, context));
    }
}
