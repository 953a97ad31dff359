//! Request and response shapes, and the response assembler.
//!
//! A request is the ordered list of prior turns plus opaque passthrough data.
//! The response is every completed output item, in emission order, with the
//! passthrough data echoed back unchanged.

use crate::stream_event::{AgentStreamEvent, OutputItem};
use caregaps_core::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Appended as a last item when the profile asks for it.
pub const PRIVACY_NOTICE: &str = "\n\n---\n⚠️ **Privacy Notice**: Sensitive patient information is partially masked. Names show as initials, MRNs show last 4 digits only, and contact info is redacted. Full details are available in the secure clinical system.";

/// One prior conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub input: Vec<InputMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_inputs: Option<Value>,
}

impl AgentRequest {
    /// A single-turn request.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            input: vec![InputMessage {
                role: Role::User,
                content: text.into(),
            }],
            custom_inputs: None,
        }
    }

    pub fn with_custom_inputs(mut self, custom_inputs: Value) -> Self {
        self.custom_inputs = Some(custom_inputs);
        self
    }

    /// Index of the turn the guard checks: the last user turn.
    pub fn last_user_index(&self) -> Option<usize> {
        self.input.iter().rposition(|m| m.role == Role::User)
    }

    /// The user and assistant turns as conversation messages.
    ///
    /// System turns are dropped: the profile's prompt is the only system
    /// instruction. Tool turns are dropped too, since they carry no call id
    /// to answer.
    pub fn to_messages(&self) -> Vec<Message> {
        self.input
            .iter()
            .filter_map(|turn| match turn.role {
                Role::User => Some(Message::user(&turn.content)),
                Role::Assistant => Some(Message::assistant(&turn.content)),
                Role::System | Role::Tool => {
                    tracing::debug!(role = ?turn.role, "Dropping caller turn");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub custom_outputs: Option<Value>,
}

impl AgentResponse {
    /// All text a reader would see, item by item.
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter_map(OutputItem::visible_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text of the last message item.
    pub fn final_message(&self) -> Option<&str> {
        self.output.iter().rev().find_map(OutputItem::as_text)
    }
}

/// Collects completed items from a stream of agent events.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    output: Vec<OutputItem>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the item of a `done` event. Deltas are dropped.
    pub fn push(&mut self, event: AgentStreamEvent) {
        if let Some(item) = event.into_item() {
            self.output.push(item);
        }
    }

    pub fn finish(self, custom_outputs: Option<Value>) -> AgentResponse {
        AgentResponse {
            output: self.output,
            custom_outputs,
        }
    }

    /// Drain `events` to the end.
    pub async fn collect(
        mut events: mpsc::Receiver<AgentStreamEvent>,
        custom_outputs: Option<Value>,
    ) -> AgentResponse {
        let mut assembler = Self::new();
        while let Some(event) = events.recv().await {
            assembler.push(event);
        }
        assembler.finish(custom_outputs)
    }
}
