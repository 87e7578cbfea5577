//! HTTP request handlers

use crate::api::AppContext;
use crate::db::{queue, settings};
use crate::state::StatusSnapshot;
use autodj_common::db::{HistoryEntry, QueueEntry};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Upper bound for list endpoints
const MAX_LIST_LIMIT: i64 = 500;
const DEFAULT_HISTORY_LIMIT: i64 = 20;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// 0-100; wider integer so out-of-range values reach validation
    volume: i64,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    success: bool,
    volume: u8,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    command: String,
    #[serde(default)]
    volume: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    queue: Vec<QueueEntry>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    history: Vec<HistoryEntry>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn api_error(code: StatusCode, message: impl Into<String>) -> ApiError {
    (
        code,
        Json(StatusResponse {
            status: message.into(),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "autodj_player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
    })
}

// ============================================================================
// Status Endpoints
// ============================================================================

/// GET /status - Playback status snapshot
pub async fn get_status(State(ctx): State<AppContext>) -> Json<StatusSnapshot> {
    Json(ctx.state.status())
}

/// GET /queue - Pending requests in play order
pub async fn get_queue(State(ctx): State<AppContext>) -> Result<Json<QueueResponse>, ApiError> {
    match queue::fetch_pending(&ctx.db_pool, MAX_LIST_LIMIT).await {
        Ok(queue) => Ok(Json(QueueResponse { queue })),
        Err(e) => {
            error!("Failed to read queue: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read queue: {}", e),
            ))
        }
    }
}

/// GET /history?limit=N - Recently played, newest first
pub async fn get_history(
    State(ctx): State<AppContext>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    match queue::recent_history(&ctx.db_pool, limit).await {
        Ok(history) => Ok(Json(HistoryResponse { history })),
        Err(e) => {
            error!("Failed to read history: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read history: {}", e),
            ))
        }
    }
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// POST /skip - Skip the current track
///
/// Refused (`success: false`) between tracks, while the next one is still
/// being resolved or downloaded.
pub async fn skip(State(ctx): State<AppContext>) -> Json<SuccessResponse> {
    let success = ctx.state.request_skip();
    info!("Skip requested (accepted: {})", success);
    Json(SuccessResponse { success })
}

/// POST /pause - Pause, keeping the position
///
/// Only accepted while a track is audible.
pub async fn pause(State(ctx): State<AppContext>) -> Json<SuccessResponse> {
    let success = ctx.state.request_pause();
    info!("Pause requested (accepted: {})", success);
    Json(SuccessResponse { success })
}

/// POST /resume - Resume a paused track
pub async fn resume(State(ctx): State<AppContext>) -> Json<SuccessResponse> {
    let success = ctx.state.request_resume();
    info!("Resume requested (accepted: {})", success);
    Json(SuccessResponse { success })
}

/// POST /volume - Volume for upcoming stream starts
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, ApiError> {
    let volume = apply_volume(&ctx, req.volume).await?;
    Ok(Json(VolumeResponse {
        success: true,
        volume,
    }))
}

async fn apply_volume(ctx: &AppContext, requested: i64) -> Result<u8, ApiError> {
    let volume = u8::try_from(requested)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Volume must be 0-100, got {}", requested),
            )
        })?;

    let volume = ctx.state.set_volume(volume);
    info!("Volume set to {}%", volume);

    if let Err(e) = settings::set_volume_percent(&ctx.db_pool, volume).await {
        error!("Failed to persist volume: {}", e);
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to persist volume: {}", e),
        ));
    }

    Ok(volume)
}

/// POST /command - Single-endpoint form of the control operations
///
/// Commands: `skip`, `pause`, `resume`, `volume` (with `volume`).
pub async fn command(
    State(ctx): State<AppContext>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let success = match req.command.as_str() {
        "skip" | "next" => ctx.state.request_skip(),
        "pause" => ctx.state.request_pause(),
        "resume" | "play" => ctx.state.request_resume(),
        "volume" => {
            let requested = req.volume.ok_or_else(|| {
                api_error(StatusCode::BAD_REQUEST, "volume command needs a volume")
            })?;
            apply_volume(&ctx, requested).await?;
            true
        }
        other => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Unknown command: {}", other),
            ))
        }
    };

    info!("Command '{}' (accepted: {})", req.command, success);
    Ok(Json(SuccessResponse { success }))
}
