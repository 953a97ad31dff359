//! Completion stream adapter — the loop's only view of the model.
//!
//! Owns the sampling parameters and turns every provider failure (error
//! response, interrupted stream, timeout) into a single apology chunk. The
//! stream it hands out always ends with a `done` chunk and never yields an
//! error.

use caregaps_core::error::ProviderError;
use caregaps_core::{
    DomainEvent, ErrorKind, EventBus, Message, Provider, ProviderRequest, StreamChunk,
    ToolDefinition,
};
use serde_json::{Map, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};

/// Text sent in place of a model answer when the endpoint fails.
pub const MODEL_ERROR_APOLOGY: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fault-absorbing wrapper around a [`Provider`].
#[derive(Clone)]
pub struct CompletionStream {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CompletionStream {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
            events: Arc::new(EventBus::default()),
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Wall-clock bound on one whole model turn.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Start one model turn.
    ///
    /// Text deltas arrive in delivery order; the final chunk carries the
    /// turn's completed tool calls.
    pub fn stream(&self, messages: &[Message], tools: &[ToolDefinition]) -> mpsc::Receiver<StreamChunk> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            tools: tools.to_vec(),
            stream: true,
        };

        let (tx, rx) = mpsc::channel(64);
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.forward(request, &tx).await {
                this.report(&e);
                let _ = tx.send(StreamChunk::text(MODEL_ERROR_APOLOGY)).await;
                let _ = tx.send(StreamChunk::finish(Vec::new(), None)).await;
            }
        });
        rx
    }

    /// Relay provider chunks until the turn ends. Any error stops the relay
    /// before a `done` chunk has been sent.
    async fn forward(
        &self,
        request: ProviderRequest,
        tx: &mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let deadline = Instant::now() + self.timeout;
        let timed_out = || ProviderError::Timeout(format!("no answer within {:?}", self.timeout));

        let mut upstream = timeout_at(deadline, self.provider.stream(request))
            .await
            .map_err(|_| timed_out())??;

        loop {
            match timeout_at(deadline, upstream.recv()).await {
                Err(_) => return Err(timed_out()),
                Ok(None) => {
                    // Upstream closed without a terminal chunk
                    let _ = tx.send(StreamChunk::finish(Vec::new(), None)).await;
                    return Ok(());
                }
                Ok(Some(Err(e))) => return Err(e),
                Ok(Some(Ok(chunk))) => {
                    let done = chunk.done;
                    if tx.send(chunk).await.is_err() || done {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn report(&self, error: &ProviderError) {
        tracing::error!(
            provider = %self.provider.name(),
            model = %self.model,
            error = %error,
            "Model call failed"
        );
        let mut context = Map::new();
        context.insert("model".into(), json!(self.model));
        context.insert("provider".into(), json!(self.provider.name()));
        self.events.publish(DomainEvent::error(
            ErrorKind::LlmCallError,
            error.to_string(),
            context,
        ));
    }
}
