//! Asset domain types.
//!
//! Assets are typed data artifacts attached to a conversation: search
//! results the bot saved, email lists produced by an agent job, notes the
//! user uploaded. The bot can mint new ones in a final response.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage format of an asset. Unrecognised values map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Txt,
    Pdf,
    Csv,
    Json,
    Png,
    Jpg,
    Jpeg,
    Gif,
    Mp3,
    Mp4,
    Wav,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Logical shape of an asset's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Unstructured,
    EmailList,
    GenericList,
    GenericTable,
}

/// Asset lifecycle: `proposed → pending → ready | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Proposed,
    Pending,
    Ready,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AssetStatus>,

    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub agent_associations: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Keys this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A typed data artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Empty when the producer did not assign one yet.
    #[serde(default)]
    pub asset_id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "fileType", default)]
    pub file_type: FileType,

    #[serde(rename = "dataType", default)]
    pub data_type: DataType,

    #[serde(default)]
    pub content: serde_json::Value,

    #[serde(default)]
    pub metadata: AssetMetadata,
}

impl Asset {
    /// Create a fresh asset with a generated id.
    pub fn new(name: impl Into<String>, file_type: FileType, data_type: DataType) -> Self {
        Self {
            asset_id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            file_type,
            data_type,
            content: serde_json::Value::Null,
            metadata: AssetMetadata::default(),
        }
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Fill every bookkeeping field the producer left blank.
    ///
    /// Assigns an id, stamps `createdAt`/`updatedAt`, sets `creator`,
    /// `version` 1 and status `ready`. Fields already present are kept.
    pub fn stamp(&mut self, creator: &str) {
        if self.asset_id.trim().is_empty() {
            self.asset_id = Uuid::new_v4().to_string();
        }
        let now = Utc::now().to_rfc3339();
        let meta = &mut self.metadata;
        meta.created_at.get_or_insert_with(|| now.clone());
        meta.updated_at.get_or_insert(now);
        meta.creator.get_or_insert_with(|| creator.to_string());
        meta.version.get_or_insert(1);
        meta.status.get_or_insert(AssetStatus::Ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_file_type_maps_to_unknown() {
        let asset: Asset = serde_json::from_value(serde_json::json!({
            "name": "scan",
            "fileType": "tiff",
            "content": "..."
        }))
        .unwrap();
        assert_eq!(asset.file_type, FileType::Unknown);
        assert_eq!(asset.data_type, DataType::Unstructured);
        assert!(asset.asset_id.is_empty());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let asset = Asset::new("inbox", FileType::Json, DataType::EmailList);
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["fileType"], "json");
        assert_eq!(json["dataType"], "email_list");
    }

    #[test]
    fn extra_metadata_keys_survive_round_trip() {
        let asset: Asset = serde_json::from_value(serde_json::json!({
            "asset_id": "a-1",
            "name": "notes",
            "fileType": "txt",
            "metadata": { "status": "pending", "source": "upload" }
        }))
        .unwrap();
        assert_eq!(asset.metadata.status, Some(AssetStatus::Pending));
        assert_eq!(asset.metadata.extra["source"], "upload");

        let back = serde_json::to_value(&asset).unwrap();
        assert_eq!(back["metadata"]["source"], "upload");
    }

    #[test]
    fn stamp_fills_missing_fields_only() {
        let mut asset: Asset = serde_json::from_value(serde_json::json!({
            "name": "weather",
            "fileType": "txt",
            "metadata": { "creator": "user", "version": 3 }
        }))
        .unwrap();
        asset.stamp("bot");

        assert!(!asset.asset_id.is_empty());
        assert_eq!(asset.metadata.creator.as_deref(), Some("user"));
        assert_eq!(asset.metadata.version, Some(3));
        assert_eq!(asset.metadata.status, Some(AssetStatus::Ready));
        assert!(asset.metadata.created_at.is_some());
        assert!(asset.metadata.updated_at.is_some());
    }

    #[test]
    fn stamp_keeps_existing_id() {
        let mut asset = Asset::new("x", FileType::Txt, DataType::Unstructured);
        let id = asset.asset_id.clone();
        asset.stamp("bot");
        assert_eq!(asset.asset_id, id);
        assert_eq!(asset.metadata.creator.as_deref(), Some("bot"));
    }
}
