//! URL content retrieval tool.
//!
//! Fetches a page, strips markup with `scraper`, and returns the paragraphs
//! that mention the query. Failures come back as
//! `{"error": "...", "url": ..., "query": ...}`.

use async_trait::async_trait;
use fractalbot_config::RetrieveConfig;
use fractalbot_core::error::ToolError;
use fractalbot_core::tool::Tool;
use scraper::Html;
use serde_json::json;
use tracing::{debug, warn};

const DEFAULT_MAX_LENGTH: usize = 1000;
const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

pub struct RetrieveTool {
    client: reqwest::Client,
}

impl RetrieveTool {
    pub fn from_config(config: &RetrieveConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch {url}: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Failed to fetch {url}: HTTP {}", status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| format!("Failed to read body of {url}: {e}"))
    }
}

/// Visible text of an HTML document, one paragraph per non-empty line.
///
/// Text nodes are concatenated in document order (skipping script, style
/// and noscript content), whitespace is collapsed within each line, blank
/// lines are dropped and the remaining lines are joined by `"\n\n"`.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cut `text` to at most `max_length` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Paragraphs of `text` containing `query` (case-insensitive).
///
/// Falls back to the whole text as a single element when the query is
/// empty or nothing matches.
pub fn relevant_chunks(text: &str, query: &str) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    if !needle.is_empty() {
        let matches: Vec<String> = text
            .split("\n\n")
            .filter(|p| p.to_lowercase().contains(&needle))
            .map(str::to_string)
            .collect();
        if !matches.is_empty() {
            return matches;
        }
    }
    vec![text.to_string()]
}

#[async_trait]
impl Tool for RetrieveTool {
    fn name(&self) -> &str {
        "retrieve"
    }

    fn description(&self) -> &str {
        "Retrieve the text content of a web page. Returns the paragraphs relevant to the query, \
         or the beginning of the page when nothing matches."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to retrieve"
                },
                "query": {
                    "type": "string",
                    "description": "What to look for on the page"
                },
                "max_length": {
                    "type": "integer",
                    "description": "Maximum characters of page text to consider (default 1000)",
                    "default": DEFAULT_MAX_LENGTH
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let url = arguments["url"].as_str().map(str::trim).unwrap_or_default();
        let query = arguments["query"].as_str().unwrap_or_default();
        let max_length = arguments["max_length"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_LENGTH);

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(json!({
                "error": "URL must start with http:// or https://",
                "url": url,
                "query": query,
            }));
        }

        debug!(url, query, max_length, "Retrieving page");

        let html = match self.fetch(url).await {
            Ok(html) => html,
            Err(error) => {
                warn!(url, %error, "Retrieve failed");
                return Ok(json!({ "error": error, "url": url, "query": query }));
            }
        };

        let text = extract_text(&html);
        let total_length = text.chars().count();
        let truncated = truncate_chars(&text, max_length);

        Ok(json!({
            "url": url,
            "query": query.trim().to_lowercase(),
            "content": relevant_chunks(&truncated, query),
            "total_length": total_length,
        }))
    }
}
