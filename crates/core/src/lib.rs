//! # CareGaps Core
//!
//! Domain types, traits, and error definitions for the CareGaps agent.
//! This crate does no I/O of its own; it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam with the outside world is a trait here: the language model
//! ([`Provider`]) and the data functions ([`Tool`]). Implementations live in
//! their respective crates, so the orchestration loop can be driven by
//! scripted stand-ins in tests.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentProfile, DataMode, HistoryPolicy, ProfileKind};
pub use error::{Error, ErrorKind, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage,
};
pub use tool::{Tool, ToolPayload, ToolRegistry, ToolResult, ToolSpec};
