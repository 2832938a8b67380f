//! Loop-level streaming events.
//!
//! `LoopEvent` is what the gateway forwards to clients over SSE:
//! - `{"status": "thinking", ...}`    a backend call is about to start
//! - `{"status": "tool_call", ...}`   a tool is being invoked
//! - `{"status": "tool_result", ...}` the tool finished
//! - `{"token": ..., "metadata": ...}` the reply text
//! - `{"status": "complete", ...}`    the run is over, with side effects
//! - `{"status": "error", ...}`       the run failed

use serde::Serialize;

use crate::contract::ToolInvocation;

/// Progress updates emitted while the loop runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusEvent {
    Thinking {
        iteration: usize,
    },

    ToolCall {
        iteration: usize,
        id: String,
        tool: ToolInvocation,
    },

    ToolResult {
        iteration: usize,
        id: String,
        tool: String,
        results: serde_json::Value,
    },

    Complete {
        #[serde(rename = "sideEffects")]
        side_effects: serde_json::Value,
    },

    Error {
        message: String,
    },
}

/// Events emitted by a streaming loop run.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoopEvent {
    Status(StatusEvent),

    /// The reply text, sent once just before `complete` or `error`.
    Token {
        token: String,
        metadata: serde_json::Map<String, serde_json::Value>,
    },
}

impl LoopEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Token { .. } => "token",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Status(StatusEvent::Complete { .. }) | Self::Status(StatusEvent::Error { .. })
        )
    }
}

impl From<StatusEvent> for LoopEvent {
    fn from(event: StatusEvent) -> Self {
        Self::Status(event)
    }
}
