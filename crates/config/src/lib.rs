//! Configuration loading, validation, and management for CareGaps.
//!
//! Loads configuration from `~/.caregaps/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use caregaps_core::{AgentProfile, DataMode, HistoryPolicy, ProfileKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.caregaps/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Token for the serving endpoint and the function service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub privacy: PrivacyConfig,

    #[serde(default)]
    pub functions: FunctionsConfig,

    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("llm", &self.llm)
            .field("agent", &self.agent)
            .field("privacy", &self.privacy)
            .field("functions", &self.functions)
            .field("guard", &self.guard)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// The model serving endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (e.g. `https://<workspace>/serving-endpoints`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/serving-endpoints".into()
}
fn default_model() -> String {
    "databricks-meta-llama-3-3-70b-instruct".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub profile: ProfileKind,

    /// Overrides the profile's iteration ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default = "default_history_threshold")]
    pub history_threshold: usize,

    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default)]
    pub data_mode: DataMode,

    /// Replace the profile's system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_history_threshold() -> usize {
    7
}
fn default_history_window() -> usize {
    6
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            profile: ProfileKind::default(),
            max_iterations: None,
            history_threshold: default_history_threshold(),
            history_window: default_history_window(),
            data_mode: DataMode::default(),
            system_prompt_override: None,
        }
    }
}

/// Unset fields fall back to the profile's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phi_masking: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_notice: Option<bool>,
}

/// Where function schemas and results come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsConfig {
    /// Base URL of the function-execution service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,

    /// Namespaced function identifiers to expose. Empty means the
    /// built-in roster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    /// Offline JSON file with tool descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,

    /// Canned function results, keyed by namespaced identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_path: Option<PathBuf>,

    #[serde(default = "default_function_timeout")]
    pub timeout_secs: u64,
}

fn default_function_timeout() -> u64 {
    60
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            names: vec![],
            catalog_path: None,
            fixtures_path: None,
            timeout_secs: default_function_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_max_input_chars() -> usize {
    1000
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.caregaps/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `CAREGAPS_API_KEY`, then `DATABRICKS_TOKEN`
    /// - `CAREGAPS_MODEL`
    /// - `CAREGAPS_BASE_URL`
    /// - `CAREGAPS_DATA_MODE` (`real` | `demo`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = lookup("CAREGAPS_API_KEY").or_else(|| lookup("DATABRICKS_TOKEN"));
        }
        if let Some(model) = lookup("CAREGAPS_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = lookup("CAREGAPS_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(mode) = lookup("CAREGAPS_DATA_MODE") {
            self.agent.data_mode = mode.parse().map_err(ConfigError::ValidationError)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".caregaps")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_iterations == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.agent.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_window must be at least 1".into(),
            ));
        }
        if self.guard.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "guard.max_input_chars must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The agent profile this configuration selects, with overrides applied.
    pub fn profile(&self) -> AgentProfile {
        let mut profile = AgentProfile::for_kind(self.agent.profile, self.agent.data_mode);
        if let Some(prompt) = &self.agent.system_prompt_override {
            profile.system_prompt = prompt.clone();
        }
        if let Some(max_iterations) = self.agent.max_iterations {
            profile.max_iterations = max_iterations;
        }
        profile.history = HistoryPolicy {
            threshold: self.agent.history_threshold,
            window: self.agent.history_window,
        };
        if let Some(masking) = self.privacy.phi_masking {
            profile.phi_masking = masking;
        }
        if let Some(notice) = self.privacy.privacy_notice {
            profile.privacy_notice = notice;
        }
        profile
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.model, "databricks-meta-llama-3-3-70b-instruct");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.guard.max_input_chars, 1000);
        assert_eq!(config.functions.timeout_secs, 60);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.model, config.llm.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iteration_ceiling_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.agent.profile, ProfileKind::Primary);
    }

    #[test]
    fn load_from_file_reads_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
model = "databricks-gpt-oss-20b"

[agent]
profile = "masked"
max_iterations = 3

[functions]
service_url = "https://workspace.example.com/api/2.0"
names = ["dev_kiddo.silver.get_gap_statistics"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.llm.model, "databricks-gpt-oss-20b");
        assert_eq!(config.agent.profile, ProfileKind::Masked);
        assert_eq!(config.functions.names.len(), 1);

        let profile = config.profile();
        assert_eq!(profile.max_iterations, 3);
        assert!(profile.phi_masking);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm\nmodel = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("DATABRICKS_TOKEN", "dapi-secret"),
            ("CAREGAPS_MODEL", "other-model"),
            ("CAREGAPS_DATA_MODE", "demo"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("dapi-secret"));
        assert_eq!(config.llm.model, "other-model");
        assert_eq!(config.agent.data_mode, DataMode::Demo);
        assert!(config.profile().system_prompt.contains("DEMO MODE"));
    }

    #[test]
    fn bad_data_mode_env_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|key| (key == "CAREGAPS_DATA_MODE").then(|| "fake".into()));
        assert!(result.is_err());
    }

    #[test]
    fn privacy_overrides_profile_defaults() {
        let mut config = AppConfig::default();
        config.privacy.phi_masking = Some(true);
        let profile = config.profile();
        assert!(profile.phi_masking);
        assert!(!profile.privacy_notice);
        assert_eq!(profile.max_iterations, 10);
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = AppConfig {
            api_key: Some("dapi-very-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("dapi-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("databricks-meta-llama-3-3-70b-instruct"));
        assert!(toml_str.contains("max_input_chars"));
    }
}
