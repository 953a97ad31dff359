//! LLM provider implementations for CareGaps.
//!
//! The serving endpoint implements the `caregaps_core::Provider` trait; the
//! orchestration loop reaches it only through [`CompletionStream`].

pub mod adapter;
pub mod openai_compat;

pub use adapter::{CompletionStream, MODEL_ERROR_APOLOGY};
pub use openai_compat::OpenAiCompatProvider;

use caregaps_config::AppConfig;
use caregaps_core::error::ProviderError;
use caregaps_core::{EventBus, Provider};
use std::sync::Arc;
use std::time::Duration;

/// Build the serving-endpoint provider described by `config`.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let token = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API token (set CAREGAPS_API_KEY or DATABRICKS_TOKEN)".into(),
        )
    })?;
    let provider = OpenAiCompatProvider::databricks(
        &config.llm.base_url,
        token,
        Duration::from_secs(config.llm.request_timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

/// Wrap `provider` in the adapter with the configured sampling and timeout.
pub fn completion_stream(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    events: Arc<EventBus>,
) -> CompletionStream {
    CompletionStream::new(provider, &config.llm.model)
        .with_sampling(config.llm.temperature, config.llm.max_tokens)
        .with_timeout(Duration::from_secs(config.llm.request_timeout_secs))
        .with_events(events)
}
