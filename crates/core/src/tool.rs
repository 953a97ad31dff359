//! Tool trait — the abstraction over the data functions the model may call.
//!
//! Each tool wraps one function of the external catalog. The registry is
//! built once at process start and shared read-only across requests.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Invocation schema for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The flattened alias advertised to the model (unique per registry)
    pub name: String,

    /// The namespaced identifier the function service knows
    /// (e.g. `catalog.schema.function`)
    pub qualified_name: String,

    /// Description sent to the model
    pub description: String,

    /// JSON Schema of the parameters
    pub parameters: Value,

    /// Names of the parameters the schema marks as required
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolSpec {
    /// Build a spec, reading the required parameter names out of the schema.
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        let required = parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            description: description.into(),
            parameters,
            required,
        }
    }

    /// Convert into the definition sent to the LLM.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// A successful function result, classified by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ToolPayload {
    /// An ordered sequence of field → value records (possibly empty)
    Records(Vec<Map<String, Value>>),
    /// A single field → value record
    Record(Map<String, Value>),
    /// A list whose items are not all records
    List(Vec<Value>),
    /// Anything else
    Scalar(Value),
}

impl ToolPayload {
    /// Classify a raw value. Strings holding a JSON array or object are
    /// decoded first; any other string stays a scalar.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                if items.iter().all(Value::is_object) {
                    Self::Records(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                Value::Object(map) => Some(map),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Self::List(items)
                }
            }
            Value::Object(map) => Self::Record(map),
            Value::String(text) => match serde_json::from_str::<Value>(text.trim()) {
                Ok(parsed @ (Value::Array(_) | Value::Object(_))) => Self::from_value(parsed),
                _ => Self::Scalar(Value::String(text)),
            },
            other => Self::Scalar(other),
        }
    }

    /// True for an empty list or an empty record.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Records(rows) => rows.is_empty(),
            Self::Record(map) => map.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Scalar(_) => false,
        }
    }

    /// True when the payload is structured data (a list or a record).
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

/// The outcome of one tool execution.
///
/// Failures carry a human-readable message that is handed to the model as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { payload: ToolPayload },
    Failure { message: String },
}

impl ToolResult {
    pub fn success(payload: ToolPayload) -> Self {
        Self::Success { payload }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The core Tool trait.
///
/// Implementations never fail past this boundary: every error is converted
/// into a [`ToolResult::Failure`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The invocation schema of this tool.
    fn spec(&self) -> &ToolSpec;

    /// Execute the tool with already-parsed arguments.
    async fn execute(&self, arguments: Map<String, Value>) -> ToolResult;

    /// The alias the model uses for this tool.
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        self.spec().to_definition()
    }
}

/// A registry of available tools.
///
/// Names are unique; registration order is preserved so the schemas
/// advertised to the model are stable. Built once, then only read.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Rejects a name that is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// The schema of every registered tool, in registration order.
    pub fn list_specs(&self) -> Vec<&ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A simple test tool for unit tests.
    struct EchoTool {
        spec: ToolSpec,
    }

    impl EchoTool {
        fn named(name: &str) -> Arc<dyn Tool> {
            Arc::new(Self {
                spec: ToolSpec::new(
                    name,
                    format!("test.echo.{name}"),
                    "Echoes back the input",
                    json!({
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    }),
                ),
            })
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, arguments: Map<String, Value>) -> ToolResult {
            ToolResult::success(ToolPayload::Record(arguments))
        }
    }

    #[test]
    fn spec_reads_required_parameters() {
        let tool = EchoTool::named("echo");
        assert_eq!(tool.spec().required, vec!["text".to_string()]);
        assert_eq!(tool.spec().qualified_name, "test.echo.echo");
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("echo")).unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("echo")).unwrap();
        let err = registry.register(EchoTool::named("echo")).unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_definitions_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("zeta")).unwrap();
        registry.register(EchoTool::named("alpha")).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs[0].name, "zeta");
        assert_eq!(defs[1].name, "alpha");
        assert_eq!(registry.names(), vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("echo")).unwrap();

        let mut args = Map::new();
        args.insert("text".into(), json!("hello world"));
        let result = registry.get("echo").unwrap().execute(args).await;
        assert!(result.is_success());
    }

    #[test]
    fn payload_classifies_records_and_scalars() {
        let rows = ToolPayload::from_value(json!([{"a": 1}, {"a": 2}]));
        assert!(matches!(rows, ToolPayload::Records(ref r) if r.len() == 2));

        let mixed = ToolPayload::from_value(json!([1, "two"]));
        assert!(matches!(mixed, ToolPayload::List(_)));

        let record = ToolPayload::from_value(json!({"total_gaps": 12}));
        assert!(matches!(record, ToolPayload::Record(_)));

        let scalar = ToolPayload::from_value(json!(42));
        assert!(matches!(scalar, ToolPayload::Scalar(_)));
        assert!(!scalar.is_structured());
    }

    #[test]
    fn payload_decodes_json_strings() {
        let payload = ToolPayload::from_value(json!(r#"[{"patient_name":"A B"}]"#));
        assert!(matches!(payload, ToolPayload::Records(ref r) if r.len() == 1));

        let plain = ToolPayload::from_value(json!("Error: nothing here"));
        assert_eq!(plain, ToolPayload::Scalar(json!("Error: nothing here")));
    }

    #[test]
    fn empty_list_is_empty_records() {
        let payload = ToolPayload::from_value(json!([]));
        assert_eq!(payload, ToolPayload::Records(vec![]));
        assert!(payload.is_empty());
    }
}
