//! Error types for the CareGaps domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all CareGaps operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing required parameters for {tool_name}: {}", missing.join(", "))]
    MissingParameters {
        tool_name: String,
        missing: Vec<String>,
    },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

/// Classification of every failure the agent reports to the observability sink.
///
/// Only `InputValidationFailed` is ever surfaced to the caller as a rejection;
/// every other kind is absorbed by the orchestration loop and turned into
/// conversational text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input guard refused the user's text.
    InputValidationFailed,
    /// The model asked for a function that is not in the registry.
    ToolNotFound,
    /// The model called a function without its required parameters.
    ToolArgumentMissing,
    /// The tool-call request itself could not be handled (bad arguments).
    ToolCallError,
    /// The function-execution service reported an error for the call.
    FunctionExecutionError,
    /// The call to the function-execution service failed locally
    /// (network, decoding, timeout).
    FunctionException,
    /// The completion endpoint failed.
    LlmCallError,
    /// The loop hit its iteration ceiling.
    MaxIterations,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputValidationFailed => "input_validation_failed",
            Self::ToolNotFound => "tool_not_found",
            Self::ToolArgumentMissing => "tool_argument_missing",
            Self::ToolCallError => "tool_call_error",
            Self::FunctionExecutionError => "function_execution_error",
            Self::FunctionException => "function_exception",
            Self::LlmCallError => "llm_call_error",
            Self::MaxIterations => "max_iterations",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
