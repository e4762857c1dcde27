//! Error handling for the Anilytics hub

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required field missing or malformed in an ingested payload
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Durable store write failed; the reading was not recorded
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Actuator command publish failed (best-effort, never fails ingest)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Historical seed fetch timed out (window degrades to empty)
    #[error("Seed fetch timed out after {0}ms")]
    SeedFetchTimeout(u64),

    /// Empty rolling window queried for an average
    #[error("Rolling window is empty")]
    EmptyWindow,

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Assistant (Gemini) error
    #[error("Chat error: {0}")]
    Chat(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::InvalidPayload(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", msg.clone())
            }
            Error::Persistence(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                msg.clone(),
            ),
            Error::Transport(msg) => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR", msg.clone()),
            Error::SeedFetchTimeout(ms) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SEED_FETCH_TIMEOUT",
                format!("history fetch exceeded {}ms", ms),
            ),
            Error::EmptyWindow => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "EMPTY_WINDOW",
                "rolling window is empty".to_string(),
            ),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Chat(msg) => (StatusCode::BAD_GATEWAY, "CHAT_ERROR", msg.clone()),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Sqlx(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                e.to_string(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "status": "error",
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
