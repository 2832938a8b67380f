//! Response formatter.
//!
//! Turns a loop outcome (or the error that ended it) into the reply the
//! client sees: one assistant message plus a `sideEffects` object.

use fractalbot_core::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::loop_runner::LoopOutcome;
use crate::side_effects::{SideEffects, ToolUse};

pub const ITERATION_LIMIT_REPLY: &str =
    "I've reached the maximum number of tool use iterations. Please try rephrasing your request.";

/// The externally visible reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,

    #[serde(rename = "sideEffects", default)]
    pub side_effects: Map<String, Value>,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn history_value(history: &[ToolUse]) -> Value {
    serde_json::to_value(history).unwrap_or_else(|_| json!([]))
}

/// Reply for a completed run.
pub fn format_final(effects: &SideEffects) -> ChatResponse {
    let mut metadata = Map::new();
    metadata.insert("final_response".into(), json!(effects.final_response));
    if !effects.assets.is_empty() {
        metadata.insert("asset_references".into(), json!(effects.asset_references()));
    }
    if !effects.agent_jobs.is_empty() {
        metadata.insert(
            "agent_jobs".into(),
            serde_json::to_value(&effects.agent_jobs).unwrap_or_else(|_| json!([])),
        );
    }
    if !effects.tool_use_history.is_empty() {
        metadata.insert("tool_use_history".into(), history_value(&effects.tool_use_history));
    }

    ChatResponse {
        message: Message::assistant(&effects.final_response).with_metadata(metadata),
        side_effects: object(serde_json::to_value(effects).unwrap_or_default()),
    }
}

/// Reply when the loop ran out of iterations.
pub fn format_iteration_limit(tool_use_history: &[ToolUse]) -> ChatResponse {
    let history = history_value(tool_use_history);

    let mut metadata = Map::new();
    metadata.insert("error".into(), Value::Bool(true));
    metadata.insert("max_iterations_reached".into(), Value::Bool(true));
    metadata.insert("tool_use_history".into(), history.clone());

    let mut side_effects = Map::new();
    side_effects.insert("tool_use_history".into(), history);

    ChatResponse {
        message: Message::assistant(ITERATION_LIMIT_REPLY).with_metadata(metadata),
        side_effects,
    }
}

/// Reply for a run that ended in a fatal error. The tool trace is dropped.
pub fn format_error(error: &dyn std::fmt::Display) -> ChatResponse {
    let mut metadata = Map::new();
    metadata.insert("error".into(), Value::Bool(true));

    ChatResponse {
        message: Message::assistant(format!("Error processing message: {error}"))
            .with_metadata(metadata),
        side_effects: Map::new(),
    }
}

pub fn format_outcome(outcome: &LoopOutcome) -> ChatResponse {
    match outcome {
        LoopOutcome::Final(effects) => format_final(effects),
        LoopOutcome::IterationLimit { tool_use_history } => format_iteration_limit(tool_use_history),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{FinalResponse, ToolInvocation};
    use fractalbot_core::error::{Error, ProtocolError};
    use fractalbot_core::message::Role;

    fn trace_entry(iteration: usize) -> ToolUse {
        ToolUse {
            iteration,
            id: format!("call-{iteration}"),
            tool: ToolInvocation {
                name: "search".into(),
                parameters: serde_json::Map::new(),
            },
            results: json!({ "results": [] }),
        }
    }

    #[test]
    fn final_without_extras_has_only_final_response() {
        let fr: FinalResponse = serde_json::from_value(json!({ "response": "Hi!" })).unwrap();
        let reply = format_final(&SideEffects::from_final(fr, vec![]));

        assert_eq!(reply.message.role, Role::Assistant);
        assert_eq!(reply.message.content, "Hi!");
        assert_eq!(reply.message.metadata.len(), 1);
        assert_eq!(reply.message.metadata["final_response"], "Hi!");
        assert_eq!(reply.side_effects["tool_use_history"], json!([]));
        assert!(!reply.message.is_error());
    }

    #[test]
    fn final_with_assets_jobs_and_trace() {
        let fr: FinalResponse = serde_json::from_value(json!({
            "response": "Done",
            "assets": [{ "asset_id": "a-1", "name": "Poem", "fileType": "txt" }],
            "agent_jobs": [{ "agentType": "list_labels", "output_asset_configs": [] }]
        }))
        .unwrap();
        let reply = format_final(&SideEffects::from_final(fr, vec![trace_entry(1)]));

        let meta = &reply.message.metadata;
        assert_eq!(meta["asset_references"], json!(["a-1"]));
        assert_eq!(meta["agent_jobs"][0]["agentType"], "list_labels");
        assert_eq!(meta["tool_use_history"][0]["iteration"], 1);
        assert_eq!(reply.side_effects["assets"][0]["asset_id"], "a-1");
        assert_eq!(reply.side_effects["final_response"], "Done");
    }

    #[test]
    fn iteration_limit_reply() {
        let history: Vec<ToolUse> = (1..=5).map(trace_entry).collect();
        let reply = format_iteration_limit(&history);

        assert_eq!(reply.message.content, ITERATION_LIMIT_REPLY);
        assert!(reply.message.is_error());
        assert_eq!(reply.message.metadata["max_iterations_reached"], true);
        assert_eq!(reply.side_effects.len(), 1);
        assert_eq!(reply.side_effects["tool_use_history"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn error_reply() {
        let err = Error::from(ProtocolError::NotAnObject);
        let reply = format_error(&err);

        assert!(reply.message.content.starts_with("Error processing message: "));
        assert!(reply.message.content.contains("JSON object"));
        assert!(reply.message.is_error());
        assert_eq!(reply.message.metadata.len(), 1);
        assert!(reply.side_effects.is_empty());
    }

    #[test]
    fn wire_shape_uses_side_effects_key() {
        let reply = format_error(&"boom");
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("sideEffects").is_some());
        assert_eq!(json["message"]["role"], "assistant");
        assert!(json["message"]["id"].is_string());
    }
}
