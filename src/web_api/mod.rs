//! WebAPI - REST/WebSocket endpoints
//!
//! ## Responsibilities
//!
//! - Ingest and query routes for both reading variants
//! - Manual actuation routes (bypassing threshold evaluation)
//! - Assistant routes
//! - WebSocket bridge onto the realtime hub

mod chat_routes;
mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db_connected: db_ok,
        mqtt_connected: state.transport.is_connected(),
    })
}
