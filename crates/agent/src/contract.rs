//! The JSON contract the language backend must follow.
//!
//! Every backend reply is exactly one JSON object, either
//!
//! ```json
//! {"type": "tool", "tool": {"name": "search", "parameters": {"query": "..."}}}
//! ```
//!
//! or
//!
//! ```json
//! {"type": "final_response", "response": "...", "agent_jobs": [...], "assets": [...]}
//! ```
//!
//! Anything else is a [`ProtocolError`] and aborts the loop.

use fractalbot_core::asset::Asset;
use fractalbot_core::error::ProtocolError;
use fractalbot_core::job::AgentJob;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// A request from the backend to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,

    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

/// The terminal payload of a loop run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinalResponse {
    pub response: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub agent_jobs: Vec<AgentJob>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub assets: Vec<Asset>,
}

/// A validated backend reply.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    Tool(ToolInvocation),
    FinalResponse(FinalResponse),
}

#[derive(Deserialize)]
struct ToolEnvelope {
    tool: ToolInvocation,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Strip code-fence wrapping and anything after the first blank line.
///
/// A leading "```json" and a trailing "```" are removed; if the remainder
/// contains `"\n\n"` only the text before it is kept.
pub fn clean_response(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    if let Some((first, _)) = text.split_once("\n\n") {
        debug!("Backend reply contained several blocks, keeping the first");
        text = first;
    }
    text
}

/// Validate a raw backend reply against the contract.
pub fn parse_reply(raw: &str) -> Result<BackendReply, ProtocolError> {
    let cleaned = clean_response(raw);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    let kind = match &value {
        Value::Object(map) => map.get("type").ok_or(ProtocolError::MissingType)?,
        _ => return Err(ProtocolError::NotAnObject),
    };

    match kind.as_str() {
        Some("tool") => serde_json::from_value::<ToolEnvelope>(value)
            .map(|env| BackendReply::Tool(env.tool))
            .map_err(|e| invalid_payload("tool", e)),
        Some("final_response") => serde_json::from_value::<FinalResponse>(value)
            .map(BackendReply::FinalResponse)
            .map_err(|e| invalid_payload("final_response", e)),
        Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
        None => Err(ProtocolError::UnknownType(kind.to_string())),
    }
}

fn invalid_payload(kind: &str, err: serde_json::Error) -> ProtocolError {
    ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: err.to_string(),
    }
}
