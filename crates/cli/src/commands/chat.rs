//! `fractalbot chat`: interactive or single-message chat mode.

use fractalbot_agent::{BotRequest, ChatResponse};
use fractalbot_config::AppConfig;
use fractalbot_core::asset::Asset;
use fractalbot_core::message::Message;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    ANTHROPIC_API_KEY   (default provider)");
        eprintln!("    OPENAI_API_KEY      (with FRACTALBOT_PROVIDER=openai)");
        eprintln!("    FRACTALBOT_API_KEY  (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = fractalbot_gateway::build_message_router(&config)?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let reply = router.process(BotRequest::new(msg)).await?;
        eprint!("\r              \r");
        print_reply(&reply)?;
        return Ok(());
    }

    println!();
    println!("  FractalBot: Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {}", router.agent().tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut history: Vec<Message> = Vec::new();
    let mut assets: Vec<Asset> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let request = BotRequest {
            message: input.to_string(),
            history: history.clone(),
            assets: assets.clone(),
            ..BotRequest::default()
        };

        eprint!("  ...");
        let reply = router.process(request).await?;
        eprint!("\r     \r");
        print_reply(&reply)?;

        history.push(Message::user(input));
        history.push(reply.message.clone());
        assets.extend(fractalbot_agent::generated_assets(&reply.side_effects));
        debug!(history = history.len(), assets = assets.len(), "Chat turn complete");
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn print_reply(reply: &ChatResponse) -> Result<(), Box<dyn std::error::Error>> {
    for line in reply.message.content.lines() {
        println!("  Assistant > {line}");
    }

    let effects = &reply.side_effects;
    let has_extras = ["agent_jobs", "assets", "tool_use_history"].iter().any(|key| {
        effects
            .get(*key)
            .and_then(|v| v.as_array())
            .is_some_and(|a| !a.is_empty())
    });
    if has_extras {
        println!();
        println!("  Side effects:");
        println!("{}", serde_json::to_string_pretty(effects)?);
    }
    println!();

    Ok(())
}
