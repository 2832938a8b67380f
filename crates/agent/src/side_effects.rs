//! Tool trace entries and the side-effects bundle of a final response.

use std::collections::HashSet;

use fractalbot_core::asset::Asset;
use fractalbot_core::job::AgentJob;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::{FinalResponse, ToolInvocation};

/// Creator recorded on assets the bot generates.
pub const BOT_CREATOR: &str = "bot";

/// One executed tool call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// 1-based loop iteration
    pub iteration: usize,

    /// Correlation id shared with the `tool_result` history entry
    pub id: String,

    pub tool: ToolInvocation,

    pub results: serde_json::Value,
}

/// Everything a final response produced besides its text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideEffects {
    pub final_response: String,
    pub agent_jobs: Vec<AgentJob>,
    pub assets: Vec<Asset>,
    pub tool_use_history: Vec<ToolUse>,
}

impl SideEffects {
    /// Normalise a final response and attach the tool trace.
    ///
    /// Agent jobs arrive already defaulted from deserialization; assets get
    /// ids, timestamps, creator, version and status filled in.
    pub fn from_final(response: FinalResponse, tool_use_history: Vec<ToolUse>) -> Self {
        Self::from_final_reserving(response, tool_use_history, &HashSet::new())
    }

    /// Like [`SideEffects::from_final`], but a generated asset whose id is
    /// reserved (or repeated within the response) gets a fresh id, so it
    /// can never stand in for an existing asset.
    pub fn from_final_reserving(
        response: FinalResponse,
        tool_use_history: Vec<ToolUse>,
        reserved_ids: &HashSet<String>,
    ) -> Self {
        let mut assets = response.assets;
        let mut seen = HashSet::new();
        for asset in &mut assets {
            if reserved_ids.contains(&asset.asset_id) || !seen.insert(asset.asset_id.clone()) {
                debug!(asset_id = %asset.asset_id, "Generated asset reuses a taken id, assigning a new one");
                asset.asset_id.clear();
            }
            asset.stamp(BOT_CREATOR);
            seen.insert(asset.asset_id.clone());
        }

        Self {
            final_response: response.response,
            agent_jobs: response.agent_jobs,
            assets,
            tool_use_history,
        }
    }

    /// Ids of the generated assets.
    pub fn asset_references(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.asset_id.as_str()).collect()
    }
}
