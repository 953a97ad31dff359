//! Function-execution service clients.
//!
//! The service runs a named function with a parameter map and answers with
//! either a value or an error string. [`HttpFunctionService`] talks to the
//! real endpoint; [`FixtureService`] replays canned results for demos and
//! evaluation runs.

use crate::catalog::{FunctionCatalog, ToolDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Failures of the call itself, as opposed to errors the function reports.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("function service unreachable: {0}")]
    Transport(String),

    #[error("function service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode function service response: {0}")]
    Decode(String),

    #[error("function call timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Io(String),
}

/// What the service said about one call.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutcome {
    Value(Value),
    /// Error message reported by the service for this call.
    Error(String),
}

/// Wire shape of `POST /functions/execute` answers.
#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl From<ExecuteResponse> for FunctionOutcome {
    fn from(response: ExecuteResponse) -> Self {
        match (response.error, response.value) {
            (Some(error), _) if !error.is_empty() => Self::Error(error),
            (_, Some(value)) => Self::Value(value),
            (_, None) => Self::Value(Value::Null),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    function_name: &'a str,
    parameters: &'a Map<String, Value>,
}

/// Runs functions by their namespaced identifier.
#[async_trait]
pub trait FunctionService: Send + Sync {
    async fn execute(
        &self,
        qualified_name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<FunctionOutcome, ServiceError>;
}

/// Client for the remote function-execution endpoint.
pub struct HttpFunctionService {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpFunctionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFunctionService")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HttpFunctionService {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

fn transport_error(error: reqwest::Error, timeout_secs: u64) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout(timeout_secs)
    } else {
        ServiceError::Transport(error.to_string())
    }
}

#[async_trait]
impl FunctionService for HttpFunctionService {
    async fn execute(
        &self,
        qualified_name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<FunctionOutcome, ServiceError> {
        let url = format!("{}/functions/execute", self.base_url);
        tracing::debug!(function = %qualified_name, "Calling function service");

        let response = self
            .authorize(self.client.post(&url))
            .json(&ExecuteRequest {
                function_name: qualified_name,
                parameters,
            })
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout.as_secs()))?;

        let body: ExecuteResponse = Self::read_json(response).await?;
        Ok(body.into())
    }
}

#[async_trait]
impl FunctionCatalog for HttpFunctionService {
    async fn describe(&self, names: &[String]) -> Result<Vec<ToolDescriptor>, ServiceError> {
        let url = format!("{}/functions/tools", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .query(&[("names", names.join(","))])
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout.as_secs()))?;
        Self::read_json(response).await
    }
}

/// Canned results keyed by namespaced function identifier.
///
/// A fixture value of the form `{"error": "..."}` is replayed as a
/// service-reported error. Functions without a fixture answer with an
/// empty list.
#[derive(Debug, Clone, Default)]
pub struct FixtureService {
    results: HashMap<String, Value>,
}

impl FixtureService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, qualified_name: impl Into<String>, value: Value) -> Self {
        self.results.insert(qualified_name.into(), value);
        self
    }

    /// Load a JSON object mapping function identifiers to results.
    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Io(format!("{}: {e}", path.display())))?;
        let results: HashMap<String, Value> = serde_json::from_str(&content)
            .map_err(|e| ServiceError::Decode(format!("{}: {e}", path.display())))?;
        Ok(Self { results })
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl FunctionService for FixtureService {
    async fn execute(
        &self,
        qualified_name: &str,
        _parameters: &Map<String, Value>,
    ) -> Result<FunctionOutcome, ServiceError> {
        let outcome = match self.results.get(qualified_name) {
            Some(Value::Object(obj)) if obj.len() == 1 && obj.contains_key("error") => {
                let message = match &obj["error"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                FunctionOutcome::Error(message)
            }
            Some(value) => FunctionOutcome::Value(value.clone()),
            None => FunctionOutcome::Value(Value::Array(Vec::new())),
        };
        Ok(outcome)
    }
}
