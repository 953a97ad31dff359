//! Function catalog — where tool schemas come from.
//!
//! Functions live in the external service under namespaced identifiers
//! (`catalog.schema.function`). The model cannot use dots in tool names, so
//! each one is advertised under a flattened alias with `.` replaced by `__`.

use crate::RegistryError;
use crate::service::ServiceError;
use async_trait::async_trait;
use caregaps_core::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Catalog and schema every roster function lives under.
pub const NAMESPACE: &str = "dev_kiddo.silver";

/// The functions the assistant is allowed to call.
pub const FUNCTION_ROSTER: [&str; 19] = [
    // Care gaps
    "get_top_providers",
    "get_patient_360",
    "get_gap_categories",
    "get_provider_gaps",
    "get_long_open_gaps",
    "get_outreach_needed",
    "get_appointments_with_gaps",
    "get_critical_gaps",
    "search_patients",
    "get_gaps_by_type",
    "get_gap_statistics",
    "get_department_summary",
    "get_gaps_by_age",
    "get_gaps_no_appointments",
    "get_patient_gaps",
    // Campaign analytics
    "get_campaign_statistics",
    "search_campaign_opportunities",
    "get_campaign_opportunities",
    "get_patient_campaign_history",
];

/// Namespaced identifiers of the whole roster, in roster order.
pub fn default_function_names() -> Vec<String> {
    FUNCTION_ROSTER
        .iter()
        .map(|f| format!("{NAMESPACE}.{f}"))
        .collect()
}

/// `dev_kiddo.silver.get_x` → `dev_kiddo__silver__get_x`
pub fn alias_for(qualified_name: &str) -> String {
    qualified_name.replace('.', "__")
}

/// `dev_kiddo__silver__get_x` → `dev_kiddo.silver.get_x`
pub fn qualified_for(alias: &str) -> String {
    alias.replace("__", ".")
}

/// An OpenAI-style tool descriptor as the function service publishes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(default = "function_type")]
    pub r#type: String,
    pub function: DescriptorFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorFunction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
    /// Anything else the publisher adds (`strict`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    /// The namespaced identifier this descriptor refers to.
    pub fn qualified_name(&self) -> String {
        if self.function.name.contains('.') {
            self.function.name.clone()
        } else {
            qualified_for(&self.function.name)
        }
    }

    /// Turn the descriptor into an invocation schema. Publisher-specific
    /// flags are dropped; only name, description and parameters survive.
    pub fn into_spec(self) -> Result<ToolSpec, RegistryError> {
        let qualified = self.qualified_name();
        if self.function.name.trim().is_empty() {
            return Err(RegistryError::InvalidDescriptor {
                name: qualified,
                reason: "empty function name".into(),
            });
        }
        if !self.function.parameters.is_object() {
            return Err(RegistryError::InvalidDescriptor {
                name: qualified,
                reason: "parameters must be a JSON Schema object".into(),
            });
        }
        if !self.function.extra.is_empty() {
            tracing::trace!(
                function = %qualified,
                dropped = ?self.function.extra.keys().collect::<Vec<_>>(),
                "Dropping descriptor flags"
            );
        }

        let mut parameters = self.function.parameters;
        if let Some(schema) = parameters.as_object_mut() {
            schema.remove("strict");
        }

        Ok(ToolSpec::new(
            alias_for(&qualified),
            qualified,
            self.function.description,
            parameters,
        ))
    }
}

/// A source of tool descriptors.
#[async_trait]
pub trait FunctionCatalog: Send + Sync {
    /// Describe the named functions. Unknown names may be skipped.
    async fn describe(&self, names: &[String]) -> Result<Vec<ToolDescriptor>, ServiceError>;
}

/// Descriptors read from a JSON file (an array of OpenAI-style tools).
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FunctionCatalog for FileCatalog {
    async fn describe(&self, names: &[String]) -> Result<Vec<ToolDescriptor>, ServiceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ServiceError::Io(format!("{}: {e}", self.path.display())))?;
        let descriptors: Vec<ToolDescriptor> = serde_json::from_str(&content)
            .map_err(|e| ServiceError::Decode(format!("{}: {e}", self.path.display())))?;

        Ok(descriptors
            .into_iter()
            .filter(|d| names.is_empty() || names.contains(&d.qualified_name()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn descriptor(value: Value) -> ToolDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn roster_has_nineteen_namespaced_functions() {
        let names = default_function_names();
        assert_eq!(names.len(), 19);
        assert_eq!(names[0], "dev_kiddo.silver.get_top_providers");
        assert!(names.iter().all(|n| n.starts_with("dev_kiddo.silver.")));
    }

    #[test]
    fn alias_roundtrip() {
        let alias = alias_for("dev_kiddo.silver.get_critical_gaps");
        assert_eq!(alias, "dev_kiddo__silver__get_critical_gaps");
        assert_eq!(qualified_for(&alias), "dev_kiddo.silver.get_critical_gaps");
    }

    #[test]
    fn descriptor_becomes_spec_without_strict() {
        let spec = descriptor(json!({
            "type": "function",
            "function": {
                "name": "dev_kiddo__silver__get_patient_gaps",
                "description": "Open gaps for one patient",
                "strict": true,
                "parameters": {
                    "type": "object",
                    "properties": { "patient_mrn": { "type": "string" } },
                    "required": ["patient_mrn"],
                    "strict": true
                }
            }
        }))
        .into_spec()
        .unwrap();

        assert_eq!(spec.name, "dev_kiddo__silver__get_patient_gaps");
        assert_eq!(spec.qualified_name, "dev_kiddo.silver.get_patient_gaps");
        assert_eq!(spec.required, vec!["patient_mrn".to_string()]);
        assert!(spec.parameters.get("strict").is_none());
    }

    #[test]
    fn dotted_descriptor_name_is_flattened() {
        let spec = descriptor(json!({
            "function": { "name": "dev_kiddo.silver.get_gap_statistics" }
        }))
        .into_spec()
        .unwrap();
        assert_eq!(spec.name, "dev_kiddo__silver__get_gap_statistics");
        assert!(spec.required.is_empty());
    }

    #[test]
    fn non_object_parameters_rejected() {
        let result = descriptor(json!({
            "function": { "name": "x__y__z", "parameters": [1, 2] }
        }))
        .into_spec();
        assert!(matches!(result, Err(RegistryError::InvalidDescriptor { .. })));
    }

    #[tokio::test]
    async fn file_catalog_filters_by_name() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!([
                { "type": "function", "function": { "name": "dev_kiddo__silver__get_critical_gaps" } },
                { "type": "function", "function": { "name": "dev_kiddo__silver__get_gap_statistics" } }
            ])
        )
        .unwrap();

        let catalog = FileCatalog::new(file.path());
        let found = catalog
            .describe(&["dev_kiddo.silver.get_gap_statistics".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].qualified_name(), "dev_kiddo.silver.get_gap_statistics");

        let all = catalog.describe(&[]).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn missing_catalog_file_is_io_error() {
        let catalog = FileCatalog::new("/nonexistent/functions.json");
        let err = catalog.describe(&[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
    }
}
