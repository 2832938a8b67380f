//! The FractalBot conversation loop.
//!
//! One user turn runs as:
//!
//! 1. **Route**: validate the request ([`MessageRouter`])
//! 2. **Prompt**: build the system prompt from tools, agent types and assets
//! 3. **Ask**: send the history to the backend
//! 4. **Validate**: parse the reply against the JSON contract
//! 5. **Act**: run the requested tool, append call and result, go to 3
//! 6. **Answer**: on `final_response`, format the reply and side effects
//!
//! The loop stops after at most `max_iterations` backend calls.

pub mod contract;
pub mod formatter;
pub mod loop_runner;
pub mod prompt;
pub mod router;
pub mod side_effects;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use contract::{BackendReply, FinalResponse, ToolInvocation};
pub use formatter::ChatResponse;
pub use loop_runner::{ConversationLoop, LoopInput, LoopOutcome, LoopReport, MAX_ITERATIONS};
pub use router::{BotRequest, MessageRouter, generated_assets};
pub use side_effects::{SideEffects, ToolUse};
pub use stream_event::{LoopEvent, StatusEvent};
