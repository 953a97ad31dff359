//! Invocation endpoints.
//!
//! Request body: `{"input": [{"role": "user", "content": "..."}], "custom_inputs": {...}}`.
//! The blocking endpoint answers with `{"output": [...], "custom_outputs": ...}`;
//! the streaming one sends each agent event as an SSE frame named after its
//! type.

use axum::{
    extract::State,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::SharedState;
use caregaps_agent::{AgentRequest, AgentResponse};

/// `POST /invocations`
pub async fn invoke_handler(
    State(state): State<SharedState>,
    Json(request): Json<AgentRequest>,
) -> Json<AgentResponse> {
    info!(turns = request.input.len(), "Invocation received");
    Json(state.agent.predict(request).await)
}

/// `POST /invocations/stream`
pub async fn stream_handler(
    State(state): State<SharedState>,
    Json(request): Json<AgentRequest>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    info!(turns = request.input.len(), "Streaming invocation received");

    let rx = state.agent.run_stream(request);
    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
