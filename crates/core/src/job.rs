//! Agent job proposals.
//!
//! An agent job is a unit of work the bot *proposes* in a final response
//! (fetch emails, summarise a list). It is never executed by the loop; the
//! client surfaces it for approval.

use serde::{Deserialize, Serialize};

use crate::asset::{DataType, FileType};

/// The agent types the bot may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    ListLabels,
    GetMessages,
    GetMessage,
    EmailSummarizer,
    EmailListSummarizer,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::ListLabels,
        AgentType::GetMessages,
        AgentType::GetMessage,
        AgentType::EmailSummarizer,
        AgentType::EmailListSummarizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::ListLabels => "list_labels",
            AgentType::GetMessages => "get_messages",
            AgentType::GetMessage => "get_message",
            AgentType::EmailSummarizer => "email_summarizer",
            AgentType::EmailListSummarizer => "email_list_summarizer",
        }
    }

    /// One-line description used in the system prompt and the catalogue.
    pub fn description(&self) -> &'static str {
        match self {
            AgentType::ListLabels => "Lists all labels in the connected email account",
            AgentType::GetMessages => {
                "Retrieves messages matching a query (folders, date range, max_results)"
            }
            AgentType::GetMessage => "Retrieves a single message by its message_id",
            AgentType::EmailSummarizer => "Summarizes one email (input: an email asset)",
            AgentType::EmailListSummarizer => {
                "Summarizes a list of emails (input: an email_list asset)"
            }
        }
    }

    /// Example `input_parameters` for the system prompt.
    pub fn example_parameters(&self) -> serde_json::Value {
        match self {
            AgentType::ListLabels => serde_json::json!({ "include_system_labels": true }),
            AgentType::GetMessages => serde_json::json!({
                "folders": ["INBOX"],
                "date_range": { "start": "2024-01-01", "end": "2024-01-31" },
                "max_results": 100,
                "include_attachments": false
            }),
            AgentType::GetMessage => serde_json::json!({ "message_id": "<id>" }),
            AgentType::EmailSummarizer => serde_json::json!({ "max_length": 200 }),
            AgentType::EmailListSummarizer => serde_json::json!({ "max_length": 500 }),
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts either a single value or a list on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<OneOrMany<String>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(id)) => vec![id],
        Some(OneOrMany::Many(ids)) => ids,
    })
}

/// Shape of an asset an agent job will produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputAssetConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "fileType", default)]
    pub file_type: FileType,

    #[serde(rename = "dataType", default)]
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default = "default_priority")]
    pub priority: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_estimated_duration")]
    pub estimated_duration: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_priority() -> String {
    "medium".into()
}

fn default_estimated_duration() -> String {
    "5m".into()
}

impl Default for JobMetadata {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            tags: Vec::new(),
            estimated_duration: default_estimated_duration(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A proposed agent job. Defaults are applied while deserializing, so a
/// parsed job is already normalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentJob {
    #[serde(rename = "agentType")]
    pub agent_type: AgentType,

    #[serde(default)]
    pub input_parameters: serde_json::Map<String, serde_json::Value>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub input_asset_ids: Vec<String>,

    pub output_asset_configs: Vec<OutputAssetConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub metadata: JobMetadata,
}
