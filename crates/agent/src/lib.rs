//! The CareGaps agent.
//!
//! One request runs one episode of a small state machine:
//!
//! 1. **Guard** the last user turn (length, injection shapes, control chars)
//! 2. **Prepare** the conversation (system prompt first, history truncated)
//! 3. **Ask the model**, streaming its text out as it arrives
//! 4. **If it asked for a function**: repair the name, check arguments, run
//!    it, format the result, and loop back to step 3
//! 5. **If it answered**: stop
//!
//! The episode stops early only on an answer; otherwise the iteration ceiling
//! ends it with a fixed apology.

pub mod formatter;
pub mod history;
pub mod loop_runner;
pub mod response;
pub mod state;
pub mod stream_event;
pub mod tool_call;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use formatter::{NEXT_ACTIONS_INSTRUCTION, NO_RESULTS, format_payload, shape_result};
pub use loop_runner::{AgentLoop, EXHAUSTED_APOLOGY, Episode};
pub use response::{AgentRequest, AgentResponse, InputMessage, PRIVACY_NOTICE, ResponseAssembler};
pub use state::{LoopState, Step};
pub use stream_event::{AgentStreamEvent, OutputItem};
pub use tool_call::{Dispatch, FUNCTION_NOT_FOUND, ToolDispatcher};
