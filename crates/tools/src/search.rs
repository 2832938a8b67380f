//! Web search tool backed by the Google Custom Search JSON API.
//!
//! Every failure (missing query, missing credentials, transport error,
//! non-2xx status, unexpected body) is reported as
//! `{"results": [], "error": "..."}` so the loop can feed it back to the
//! backend instead of aborting.

use async_trait::async_trait;
use fractalbot_config::SearchConfig;
use fractalbot_core::error::ToolError;
use fractalbot_core::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

const DEFAULT_NUM_RESULTS: u64 = 5;
const MAX_NUM_RESULTS: u64 = 10;

pub struct SearchTool {
    client: reqwest::Client,
    api_key: Option<String>,
    engine_id: Option<String>,
    base_url: String,
}

impl SearchTool {
    pub fn from_config(config: &SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: config.api_key.clone(),
            engine_id: config.engine_id.clone(),
            base_url: config.base_url.clone(),
        }
    }

    async fn search(&self, query: &str, num: u64) -> Result<Vec<SearchHit>, String> {
        let (Some(key), Some(cx)) = (self.api_key.as_deref(), self.engine_id.as_deref()) else {
            return Err("Search API credentials are not configured".into());
        };

        let num = num.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", num.as_str())])
            .send()
            .await
            .map_err(|e| format!("Search request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Search API returned {}: {}", status.as_u16(), body));
        }

        let body: CseResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid search response: {e}"))?;

        Ok(body.items.into_iter().map(SearchHit::from).collect())
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns titles, URLs and snippets of the top results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (1-10, default 5)",
                    "default": DEFAULT_NUM_RESULTS
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = arguments["query"].as_str().map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Ok(json!({ "results": [], "error": "Missing 'query' parameter" }));
        }

        let num = arguments["num_results"]
            .as_u64()
            .unwrap_or(DEFAULT_NUM_RESULTS)
            .clamp(1, MAX_NUM_RESULTS);

        debug!(query, num, "Running web search");

        match self.search(query, num).await {
            Ok(results) => Ok(json!({ "results": results })),
            Err(error) => {
                warn!(query, %error, "Web search failed");
                Ok(json!({ "results": [], "error": error }))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(rename = "displayLink", default)]
    display_link: String,
    #[serde(default)]
    pagemap: Option<serde_json::Value>,
}

/// One search hit as handed back to the backend.
#[derive(Debug, Serialize)]
struct SearchHit {
    title: String,
    url: String,
    snippet: String,
    #[serde(rename = "displayLink")]
    display_link: String,
    pagemap: serde_json::Value,
}

impl From<CseItem> for SearchHit {
    fn from(item: CseItem) -> Self {
        Self {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
            display_link: item.display_link,
            pagemap: item.pagemap.unwrap_or_else(|| json!({})),
        }
    }
}
