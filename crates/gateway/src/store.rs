//! In-memory asset store.
//!
//! Assets live for the lifetime of the process. They change only through
//! explicit create/update calls and disappear only through `delete`.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use fractalbot_core::asset::{Asset, AssetStatus, DataType, FileType};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Creator recorded on assets created through the API.
pub const USER_CREATOR: &str = "user";

/// Partial update of an asset. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: Option<serde_json::Value>,
    #[serde(rename = "fileType")]
    pub file_type: Option<FileType>,
    #[serde(rename = "dataType")]
    pub data_type: Option<DataType>,
    pub status: Option<AssetStatus>,
    pub tags: Option<Vec<String>>,
}

/// Optional filters for [`AssetStore::list`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetFilter {
    #[serde(rename = "fileType")]
    pub file_type: Option<FileType>,
    #[serde(rename = "dataType")]
    pub data_type: Option<DataType>,
}

impl AssetFilter {
    fn matches(&self, asset: &Asset) -> bool {
        self.file_type.is_none_or(|t| t == asset.file_type)
            && self.data_type.is_none_or(|t| t == asset.data_type)
    }
}

#[derive(Default)]
pub struct AssetStore {
    assets: RwLock<HashMap<String, Asset>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new asset under a freshly generated id, at version 1.
    pub async fn create(&self, mut asset: Asset) -> Asset {
        asset.asset_id = Uuid::new_v4().to_string();
        asset.metadata.version = Some(1);
        asset.stamp(USER_CREATOR);

        debug!(asset_id = %asset.asset_id, name = %asset.name, "Asset created");
        self.assets
            .write()
            .await
            .insert(asset.asset_id.clone(), asset.clone());
        asset
    }

    /// Record assets produced by a final response, keyed by their ids.
    ///
    /// Never replaces a stored asset: a generated asset whose id is already
    /// taken is skipped. Returns how many were recorded.
    pub async fn insert_generated(&self, generated: Vec<Asset>) -> usize {
        if generated.is_empty() {
            return 0;
        }
        let mut assets = self.assets.write().await;
        let mut recorded = 0;
        for asset in generated {
            if assets.contains_key(&asset.asset_id) {
                warn!(asset_id = %asset.asset_id, "Generated asset id already stored, skipping");
                continue;
            }
            debug!(asset_id = %asset.asset_id, "Generated asset recorded");
            assets.insert(asset.asset_id.clone(), asset);
            recorded += 1;
        }
        recorded
    }

    /// Ids of every stored asset.
    pub async fn ids(&self) -> HashSet<String> {
        self.assets.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<Asset> {
        self.assets.read().await.get(id).cloned()
    }

    /// All assets matching the filter, oldest first.
    pub async fn list(&self, filter: &AssetFilter) -> Vec<Asset> {
        let mut matched: Vec<Asset> = self
            .assets
            .read()
            .await
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.metadata
                .created_at
                .cmp(&b.metadata.created_at)
                .then_with(|| a.asset_id.cmp(&b.asset_id))
        });
        matched
    }

    /// Apply a patch, bump the version and refresh `updatedAt`.
    pub async fn update(&self, id: &str, patch: AssetPatch) -> Option<Asset> {
        let mut assets = self.assets.write().await;
        let asset = assets.get_mut(id)?;

        if let Some(name) = patch.name {
            asset.name = name;
        }
        if let Some(description) = patch.description {
            asset.description = Some(description);
        }
        if let Some(content) = patch.content {
            asset.content = content;
        }
        if let Some(file_type) = patch.file_type {
            asset.file_type = file_type;
        }
        if let Some(data_type) = patch.data_type {
            asset.data_type = data_type;
        }
        if let Some(status) = patch.status {
            asset.metadata.status = Some(status);
        }
        if let Some(tags) = patch.tags {
            asset.metadata.tags = tags;
        }

        let meta = &mut asset.metadata;
        meta.version = Some(meta.version.unwrap_or(1) + 1);
        meta.updated_at = Some(Utc::now().to_rfc3339());

        debug!(asset_id = %id, version = ?meta.version, "Asset updated");
        Some(asset.clone())
    }

    pub async fn delete(&self, id: &str) -> Option<Asset> {
        self.assets.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }
}
