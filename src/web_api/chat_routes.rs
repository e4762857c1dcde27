//! Chat API Routes
//!
//! Session-scoped assistant endpoints. The session id travels as a query
//! parameter; omitting it on POST creates a new session.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: Option<String>,
}

/// Create chat routes
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat", get(get_chat_history))
        .route("/chat", delete(delete_chat_session))
}

/// POST /chat?session_id= - one assistant turn
async fn chat(
    State(state): State<AppState>,
    Query(session): Query<SessionQuery>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse> {
    let query = req
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| Error::InvalidPayload("missing required field 'query'".to_string()))?;

    let reply = state.chat.chat(session.session_id, &query).await?;

    Ok(Json(json!({
        "status": "success",
        "session_id": reply.session_id,
        "response": reply.response
    })))
}

/// GET /chat?session_id= - full session transcript
async fn get_chat_history(
    State(state): State<AppState>,
    Query(session): Query<SessionQuery>,
) -> Result<impl IntoResponse> {
    let session_id = session
        .session_id
        .ok_or_else(|| Error::InvalidPayload("missing session_id".to_string()))?;

    let messages = state.chat.history(session_id).await?;

    Ok(Json(json!({
        "status": "success",
        "session_id": session_id,
        "messages": messages
    })))
}

/// DELETE /chat?session_id= - drop a session
async fn delete_chat_session(
    State(state): State<AppState>,
    Query(session): Query<SessionQuery>,
) -> Result<impl IntoResponse> {
    let session_id = session
        .session_id
        .ok_or_else(|| Error::InvalidPayload("missing session_id".to_string()))?;

    state.chat.delete(session_id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Session deleted"
    })))
}
