//! `fractalbot onboard`: first-time setup.

use fractalbot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("FractalBot: First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Add your API key to {} (or set ANTHROPIC_API_KEY)", config_path.display());
        println!("   2. Set GOOGLE_SEARCH_API_KEY and GOOGLE_SEARCH_ENGINE_ID for web search");
        println!("   3. Run: fractalbot chat\n");
    }

    Ok(())
}
