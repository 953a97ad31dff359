pub mod chat;
pub mod doctor;
pub mod eval;
pub mod onboard;
pub mod serve;
pub mod tools;

use caregaps_agent::AgentLoop;
use caregaps_config::AppConfig;
use caregaps_core::{EventBus, ToolRegistry};
use caregaps_security::{AuditLogger, TracingSink};
use std::sync::Arc;
use tracing::warn;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Wire the agent from `config`.
///
/// A missing token is fatal. A function catalog that cannot be loaded is
/// not: the agent runs with no functions and says so in the log.
pub async fn build_agent(config: &AppConfig) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API token configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export CAREGAPS_API_KEY='dapi...'");
        eprintln!("    export DATABRICKS_TOKEN='dapi...'");
        eprintln!();
        eprintln!("  Or add `api_key` to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API token found. See above for setup instructions.".into());
    }

    let events = Arc::new(EventBus::default());
    let audit = Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)]));
    audit.listen(&events);

    let provider = caregaps_providers::build_provider(config)?;
    let tools = match caregaps_tools::registry_from_config(config, events.clone()).await {
        Ok(registry) => registry,
        Err(e) => {
            warn!(error = %e, "Function catalog unavailable; continuing without functions");
            ToolRegistry::new()
        }
    };

    Ok(AgentLoop::from_config(config, provider, Arc::new(tools), events))
}
