//! HTTP serving surface for the CareGaps agent.
//!
//! - `POST /invocations`         — run one request, return every output item
//! - `POST /invocations/stream`  — same, as an SSE stream of agent events
//! - `GET  /health`              — liveness plus model and registry size
//! - `GET  /tools`               — the functions advertised to the model
//!
//! Built on Axum. The agent and its registry are built once at startup and
//! shared read-only by every request.

pub mod invocations;

use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, response::Json, routing::get, routing::post};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use caregaps_agent::AgentLoop;
use caregaps_core::{EventBus, ProfileKind};
use caregaps_security::{AuditLogger, TracingSink};

/// Request bodies are small: a conversation of short turns.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Shared state for the gateway.
#[derive(Debug)]
pub struct GatewayState {
    pub agent: AgentLoop,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(agent: AgentLoop) -> Self {
        Self {
            agent,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(tools_handler))
        .route("/invocations", post(invocations::invoke_handler))
        .route("/invocations/stream", post(invocations::stream_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Fails if no model endpoint is configured or the function catalog cannot
/// be loaded; a server with no functions would only ever apologize.
pub async fn start(config: caregaps_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let events = Arc::new(EventBus::default());
    let audit = Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)]));
    audit.listen(&events);

    let provider = caregaps_providers::build_provider(&config)?;
    let tools = Arc::new(caregaps_tools::registry_from_config(&config, events.clone()).await?);
    let agent = AgentLoop::from_config(&config, provider, tools, events);

    let app = build_router(Arc::new(GatewayState::new(agent)));

    info!(addr = %addr, model = %config.llm.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
    profile: ProfileKind,
    tools: usize,
    uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.agent.model().to_string(),
        profile: state.agent.profile().kind,
        tools: state.agent.tools().len(),
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}

#[derive(Debug, Serialize)]
struct ToolInfo {
    name: String,
    qualified_name: String,
    description: String,
    required: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ToolsResponse {
    tools: Vec<ToolInfo>,
    count: usize,
}

async fn tools_handler(State(state): State<SharedState>) -> Json<ToolsResponse> {
    let tools: Vec<ToolInfo> = state
        .agent
        .tools()
        .list_specs()
        .into_iter()
        .map(|spec| ToolInfo {
            name: spec.name.clone(),
            qualified_name: spec.qualified_name.clone(),
            description: spec.description.clone(),
            required: spec.required.clone(),
        })
        .collect();
    let count = tools.len();
    Json(ToolsResponse { tools, count })
}
