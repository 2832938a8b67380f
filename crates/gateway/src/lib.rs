//! HTTP gateway for FractalBot.
//!
//! Exposes the bot under `/api/bot`, the asset store under `/api/assets`
//! and a `/health` probe.
//!
//! Built on Axum.

pub mod api;
pub mod store;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use fractalbot_agent::{ConversationLoop, MessageRouter};
use fractalbot_config::{AppConfig, GatewayConfig};
use fractalbot_core::error::Error;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

pub use api::{ApiState, SharedApiState};
pub use store::AssetStore;

/// Wire provider, tools and loop settings from configuration.
pub fn build_message_router(config: &AppConfig) -> Result<MessageRouter, Error> {
    let providers = fractalbot_providers::build_from_config(config);
    let provider = providers.default().ok_or_else(|| Error::Config {
        message: format!("No provider named '{}' is configured", config.default_provider),
    })?;

    if !config.has_api_key() {
        warn!(provider = %config.default_provider, "No API key configured; backend calls will fail");
    }
    if !config.has_search_credentials() {
        warn!("Search credentials missing; the search tool will return errors");
    }

    let tools = Arc::new(fractalbot_tools::default_registry(config));
    let agent = ConversationLoop::new(
        provider,
        tools,
        &config.default_model,
        config.default_temperature,
    )
    .with_max_tokens(config.default_max_tokens)
    .with_max_iterations(config.agent.max_iterations);

    Ok(MessageRouter::new(agent))
}

/// CORS policy from the configured origins; `"*"` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build the full router.
///
/// Layers applied:
/// - CORS from `gateway.cors_origins`
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedApiState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(&gateway.cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(ApiState::new(build_message_router(&config)?));
    let app = build_router(state, &config.gateway);

    info!(
        addr = %addr,
        provider = %config.default_provider,
        model = %config.default_model,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
