//! HTTP control surface
//!
//! Handlers only set flags on the shared state and return; the playback task
//! picks the requests up on its next tick.

pub mod handlers;
pub mod sse;

use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub db_pool: Pool<Sqlite>,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Status and listings
        .route("/status", get(handlers::get_status))
        .route("/queue", get(handlers::get_queue))
        .route("/history", get(handlers::get_history))
        // Playback control
        .route("/skip", post(handlers::skip))
        .route("/pause", post(handlers::pause))
        .route("/resume", post(handlers::resume))
        .route("/volume", post(handlers::set_volume))
        .route("/command", post(handlers::command))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        // Enable CORS for browser front ends
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
