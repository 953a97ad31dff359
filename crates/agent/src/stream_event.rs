//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps the loop's progress into events that the gateway
//! forwards to clients over SSE. Two kinds exist:
//! - `response.output_text.delta` — partial text from the model
//! - `response.output_item.done` — a completed output item

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentStreamEvent {
    /// Partial text of the message item `item_id`.
    #[serde(rename = "response.output_text.delta")]
    TextDelta { item_id: String, delta: String },

    /// An output item is complete.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: OutputItem },
}

impl AgentStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "response.output_text.delta",
            Self::OutputItemDone { .. } => "response.output_item.done",
        }
    }

    pub fn item_done(item: OutputItem) -> Self {
        Self::OutputItemDone { item }
    }

    /// The completed item, if this is an item event.
    pub fn into_item(self) -> Option<OutputItem> {
        match self {
            Self::OutputItemDone { item } => Some(item),
            Self::TextDelta { .. } => None,
        }
    }
}

/// One entry of the response output list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    /// Assistant text
    Message { id: String, text: String },

    /// The model asked for a function
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
    },

    /// Echo of the text handed back to the model for `call_id`
    FunctionCallOutput { call_id: String, output: String },
}

impl OutputItem {
    /// A message item with a fresh id.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Message {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }

    /// The text of a message item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Message { text, .. } => Some(text),
            _ => None,
        }
    }

    /// What a reader would see for this item: message text or tool output.
    pub fn visible_text(&self) -> Option<&str> {
        match self {
            Self::Message { text, .. } => Some(text),
            Self::FunctionCallOutput { output, .. } => Some(output),
            Self::FunctionCall { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_delta() {
        let event = AgentStreamEvent::TextDelta {
            item_id: "msg_1".into(),
            delta: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"response.output_text.delta""#));
        assert!(json.contains(r#""delta":"Hello""#));
    }

    #[test]
    fn event_serialization_function_call() {
        let event = AgentStreamEvent::item_done(OutputItem::FunctionCall {
            id: "fc_1".into(),
            call_id: "call_1".into(),
            name: "dev_kiddo__silver__get_gap_statistics".into(),
            arguments: "{}".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "response.output_item.done");
        assert_eq!(json["item"]["type"], "function_call");
        assert_eq!(json["item"]["call_id"], "call_1");
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            AgentStreamEvent::TextDelta {
                item_id: "a".into(),
                delta: "b".into()
            }
            .event_type(),
            "response.output_text.delta"
        );
        assert_eq!(
            AgentStreamEvent::item_done(OutputItem::text("x")).event_type(),
            "response.output_item.done"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"response.output_item.done","item":{"type":"function_call_output","call_id":"c1","output":"No results found."}}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event.into_item(),
            Some(OutputItem::FunctionCallOutput {
                call_id: "c1".into(),
                output: "No results found.".into()
            })
        );
    }

    #[test]
    fn visible_text_skips_calls() {
        assert_eq!(OutputItem::text("hi").visible_text(), Some("hi"));
        let call = OutputItem::FunctionCall {
            id: "a".into(),
            call_id: "b".into(),
            name: "c".into(),
            arguments: "{}".into(),
        };
        assert_eq!(call.visible_text(), None);
    }
}
