//! Loop state machine.
//!
//! The state is derived from the tail of the message list and nothing else.
//! [`LoopState::transition`] is pure: the loop runner performs the returned
//! [`Step`] and appends exactly one message, then asks again.

use caregaps_core::Message;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// The model must produce the next step
    AwaitingModel,
    /// The tail is a tool-call request waiting for its result
    ToolRequested,
    /// The tail is a final assistant answer
    Done,
    /// The iteration ceiling was reached before `Done`
    Exhausted,
}

/// What the runner does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CallModel,
    ExecuteTool,
    Stop,
}

impl LoopState {
    /// Classify the tail of a message list.
    pub fn of(last: Option<&Message>) -> Self {
        match last {
            Some(msg) if msg.pending_tool_call().is_some() => Self::ToolRequested,
            Some(msg) if msg.is_final_answer() => Self::Done,
            _ => Self::AwaitingModel,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Exhausted)
    }

    /// `(state, last message) -> (next state, step)`.
    /// Terminal states never move.
    pub fn transition(self, last: Option<&Message>) -> (Self, Step) {
        if self.is_terminal() {
            return (self, Step::Stop);
        }
        let next = Self::of(last);
        let step = match next {
            Self::AwaitingModel => Step::CallModel,
            Self::ToolRequested => Step::ExecuteTool,
            Self::Done | Self::Exhausted => Step::Stop,
        };
        (next, step)
    }

    /// The ceiling was hit. Only a loop that did not finish is exhausted.
    pub fn exhaust(self) -> Self {
        match self {
            Self::Done => Self::Done,
            _ => Self::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caregaps_core::MessageToolCall;

    fn request() -> Message {
        Message::tool_request(
            "",
            MessageToolCall {
                id: "call_1".into(),
                name: "dev_kiddo__silver__get_gap_statistics".into(),
                arguments: "{}".into(),
            },
        )
    }

    #[test]
    fn user_tail_asks_the_model() {
        let (state, step) = LoopState::AwaitingModel.transition(Some(&Message::user("hi")));
        assert_eq!(state, LoopState::AwaitingModel);
        assert_eq!(step, Step::CallModel);
    }

    #[test]
    fn tool_result_tail_asks_the_model() {
        let tail = Message::tool_result("call_1", "No results found.");
        assert_eq!(
            LoopState::ToolRequested.transition(Some(&tail)),
            (LoopState::AwaitingModel, Step::CallModel)
        );
    }

    #[test]
    fn pending_call_executes_tool() {
        assert_eq!(
            LoopState::AwaitingModel.transition(Some(&request())),
            (LoopState::ToolRequested, Step::ExecuteTool)
        );
    }

    #[test]
    fn assistant_answer_is_done() {
        assert_eq!(
            LoopState::AwaitingModel.transition(Some(&Message::assistant("Here you go"))),
            (LoopState::Done, Step::Stop)
        );
    }

    #[test]
    fn system_tail_and_empty_list_ask_the_model() {
        assert_eq!(LoopState::of(Some(&Message::system("prompt"))), LoopState::AwaitingModel);
        assert_eq!(LoopState::of(None), LoopState::AwaitingModel);
    }

    #[test]
    fn terminal_states_stay_put() {
        let tail = Message::user("again");
        assert_eq!(
            LoopState::Done.transition(Some(&tail)),
            (LoopState::Done, Step::Stop)
        );
        assert_eq!(
            LoopState::Exhausted.transition(Some(&tail)),
            (LoopState::Exhausted, Step::Stop)
        );
    }

    #[test]
    fn exhaust_keeps_done() {
        assert_eq!(LoopState::Done.exhaust(), LoopState::Done);
        assert_eq!(LoopState::ToolRequested.exhaust(), LoopState::Exhausted);
        assert_eq!(LoopState::AwaitingModel.exhaust(), LoopState::Exhausted);
    }
}
