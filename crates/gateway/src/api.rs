//! HTTP API for the bot and the asset store.
//!
//! Endpoints:
//!
//! - `POST   /api/bot/run`          Run one turn, get the reply
//! - `POST   /api/bot/run/stream`   Run one turn, get an SSE stream
//! - `GET    /api/bot/tools`        Tool definitions and agent types
//! - `GET    /api/assets`           List assets (`?fileType=&dataType=`)
//! - `POST   /api/assets`           Create an asset
//! - `GET    /api/assets/{id}`      Fetch an asset
//! - `PUT    /api/assets/{id}`      Patch an asset
//! - `DELETE /api/assets/{id}`      Delete an asset

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{get, post},
};
use fractalbot_agent::{BotRequest, ChatResponse, LoopEvent, MessageRouter, StatusEvent, generated_assets};
use fractalbot_core::asset::Asset;
use fractalbot_core::job::AgentType;
use fractalbot_core::provider::ToolDefinition;
use serde::{Deserialize, Serialize};
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::store::{AssetFilter, AssetPatch, AssetStore};

// ── State ─────────────────────────────────────────────────────────────────

pub struct ApiState {
    pub router: MessageRouter,
    pub assets: AssetStore,
}

impl ApiState {
    pub fn new(router: MessageRouter) -> Self {
        Self {
            router,
            assets: AssetStore::new(),
        }
    }
}

pub type SharedApiState = Arc<ApiState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the `/api` routes. Nest this under "/api" in the main router.
pub fn api_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/bot/run", post(run_handler))
        .route("/bot/run/stream", post(run_stream_handler))
        .route("/bot/tools", get(list_tools_handler))
        .route("/assets", get(list_assets_handler).post(create_asset_handler))
        .route(
            "/assets/{id}",
            get(get_asset_handler)
                .put(update_asset_handler)
                .delete(delete_asset_handler),
        )
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentTypeDto {
    #[serde(rename = "agentType")]
    pub agent_type: AgentType,
    pub description: String,
    pub example_parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCatalogResponse {
    pub tools: Vec<ToolDefinition>,
    pub agent_types: Vec<AgentTypeDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssetListResponse {
    pub assets: Vec<Asset>,
    pub count: usize,
}

// ── Bot handlers ──────────────────────────────────────────────────────────

async fn run_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<BotRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(history = payload.history.len(), "bot/run request");

    let payload = payload.with_reserved_asset_ids(state.assets.ids().await);
    let reply = state
        .router
        .process(payload)
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    state
        .assets
        .insert_generated(generated_assets(&reply.side_effects))
        .await;

    Ok(Json(reply))
}

/// `POST /api/bot/run/stream`: same body as `/bot/run`, answered as SSE.
async fn run_stream_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<BotRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    info!(history = payload.history.len(), "bot/run/stream SSE request");

    let payload = payload.with_reserved_asset_ids(state.assets.ids().await);
    let rx = state
        .router
        .process_stream(payload)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let stream = ReceiverStream::new(rx).then(move |event| {
        let state = state.clone();
        async move {
            if let LoopEvent::Status(StatusEvent::Complete {
                side_effects: serde_json::Value::Object(map),
            }) = &event
            {
                state.assets.insert_generated(generated_assets(map)).await;
            }
            let data = serde_json::to_string(&event).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to serialize stream event");
                String::new()
            });
            Ok(SseEvent::default().event(event.event_type()).data(data))
        }
    });

    Ok(Sse::new(stream))
}

async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolCatalogResponse> {
    let agent_types = AgentType::ALL
        .iter()
        .map(|t| AgentTypeDto {
            agent_type: *t,
            description: t.description().to_string(),
            example_parameters: t.example_parameters(),
        })
        .collect();

    Json(ToolCatalogResponse {
        tools: state.router.agent().tools().definitions(),
        agent_types,
    })
}

// ── Asset handlers ────────────────────────────────────────────────────────

async fn list_assets_handler(
    State(state): State<SharedApiState>,
    Query(filter): Query<AssetFilter>,
) -> Json<AssetListResponse> {
    let assets = state.assets.list(&filter).await;
    let count = assets.len();
    Json(AssetListResponse { assets, count })
}

async fn create_asset_handler(
    State(state): State<SharedApiState>,
    Json(asset): Json<Asset>,
) -> Result<(StatusCode, Json<Asset>), ApiError> {
    if asset.name.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Asset name cannot be empty"));
    }
    let created = state.assets.create(asset).await;
    info!(asset_id = %created.asset_id, "Asset created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_asset_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<Asset>, ApiError> {
    state
        .assets
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn update_asset_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(patch): Json<AssetPatch>,
) -> Result<Json<Asset>, ApiError> {
    state
        .assets
        .update(&id, patch)
        .await
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn delete_asset_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.assets.delete(&id).await {
        Some(_) => {
            info!(asset_id = %id, "Asset deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(not_found(&id)),
    }
}

fn not_found(id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Asset not found: {id}"))
}
