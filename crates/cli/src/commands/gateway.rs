//! `fractalbot gateway`: start the HTTP API server.

use fractalbot_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("FractalBot Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   CORS origins: {}", config.gateway.cors_origins.join(", "));

    fractalbot_gateway::start(config).await?;

    Ok(())
}
