//! Built-in tool implementations for FractalBot.
//!
//! Two tools are directly executable by the conversation loop:
//! `search` (Google Custom Search) and `retrieve` (page text extraction).

pub mod retrieve;
pub mod search;

use fractalbot_config::AppConfig;
use fractalbot_core::tool::ToolRegistry;

pub use retrieve::RetrieveTool;
pub use search::SearchTool;

/// Create the tool registry from configuration.
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchTool::from_config(&config.search)));
    registry.register(Box::new(RetrieveTool::from_config(&config.retrieve)));
    registry
}
