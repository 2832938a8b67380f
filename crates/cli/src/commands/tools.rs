//! `fractalbot tools`: print the tool and agent catalogue.

use fractalbot_config::AppConfig;
use fractalbot_core::job::AgentType;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = fractalbot_tools::default_registry(&config);

    println!("Tools (run directly by the bot):");
    for def in registry.definitions() {
        println!("  {:<10} {}", def.name, def.description);
        println!("             {}", serde_json::to_string(&def.parameters)?);
    }

    println!("\nAgent types (proposed as jobs for approval):");
    for agent in AgentType::ALL {
        println!("  {:<22} {}", agent.as_str(), agent.description());
    }

    if !config.has_search_credentials() {
        println!("\nNote: search credentials are not configured; `search` will return errors.");
    }

    Ok(())
}
