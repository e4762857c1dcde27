//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::actuation_dispatcher::{topics, ActuationCommand};
use crate::error::{Error, Result};
use crate::models::{format_display, FishPayload, FishRow, PlantPayload, PlantRow};
use crate::state::AppState;
use crate::telemetry_store::TelemetryStore;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Telemetry ingest + queries
        .route("/plant_data", post(receive_plant_data))
        .route("/plant_data", get(get_plant_data))
        .route("/fish_data", post(receive_fish_data))
        .route("/fish_data", get(get_fish_data))
        // Manual actuation (bypasses threshold evaluation)
        .route("/growlights", post(trigger_growlights))
        .route("/feeder", post(trigger_feeder))
        .route("/change_water", post(trigger_water_change))
        // Assistant
        .merge(super::chat_routes::chat_routes())
        // Live observers
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    10
}

/// POST /plant_data - ingest one plant reading
async fn receive_plant_data(
    State(state): State<AppState>,
    Json(payload): Json<PlantPayload>,
) -> Result<impl IntoResponse> {
    let reading = state.pipeline.ingest_plant(payload).await?;

    let mut data = serde_json::to_value(&reading)?;
    data["recordedAt"] = json!(format_display(
        reading.recorded_at,
        state.config.display_timezone
    ));

    Ok(Json(json!({ "status": "success", "data": data })))
}

/// GET /plant_data?limit=N - most recent persisted plant rows
async fn get_plant_data(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let rows = state.store.recent_plant(query.limit).await?;
    let tz = state.config.display_timezone;

    let data: Vec<PlantRow> = rows
        .into_iter()
        .map(|r| PlantRow {
            ph: r.ph,
            tds: r.tds,
            temperature: r.temperature,
            humidity: r.humidity,
            created_at: format_display(r.created_at, tz),
        })
        .collect();

    Ok(Json(data))
}

/// POST /fish_data - ingest one fish reading
async fn receive_fish_data(
    State(state): State<AppState>,
    Json(payload): Json<FishPayload>,
) -> Result<impl IntoResponse> {
    let reading = state.pipeline.ingest_fish(payload).await?;

    let mut data = serde_json::to_value(&reading)?;
    data["recordedAt"] = json!(format_display(
        reading.recorded_at,
        state.config.display_timezone
    ));

    Ok(Json(json!({ "status": "success", "data": data })))
}

/// GET /fish_data?limit=N - most recent persisted fish rows
async fn get_fish_data(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let rows = state.store.recent_fish(query.limit).await?;
    let tz = state.config.display_timezone;

    let data: Vec<FishRow> = rows
        .into_iter()
        .map(|r| FishRow {
            turbidity: r.turbidity,
            water_temperature: r.water_temperature,
            ph: r.ph,
            created_at: format_display(r.created_at, tz),
        })
        .collect();

    Ok(Json(data))
}

#[derive(Debug, Deserialize)]
struct GrowlightsRequest {
    /// "on" or "off"
    state: String,
}

/// POST /growlights - manual grow-light switch
async fn trigger_growlights(
    State(state): State<AppState>,
    Json(req): Json<GrowlightsRequest>,
) -> Result<impl IntoResponse> {
    if req.state != "on" && req.state != "off" {
        return Err(Error::InvalidPayload(format!(
            "state must be 'on' or 'off', got '{}'",
            req.state
        )));
    }

    let value = if req.state == "on" { 1.0 } else { 0.0 };
    state
        .dispatcher
        .publish(
            ActuationCommand::new(topics::GROWLIGHTS, req.state.clone()),
            "growlights",
            value,
        )
        .await;

    Ok(Json(json!({ "status": "success", "data": { "state": req.state } })))
}

/// POST /feeder - manual feed dispense
async fn trigger_feeder(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state
        .dispatcher
        .publish(
            ActuationCommand::new(topics::FEEDER, "dispense"),
            "feeder",
            1.0,
        )
        .await;

    Ok(Json(json!({ "status": "success", "data": { "command": "dispense" } })))
}

/// POST /change_water - manual water change
async fn trigger_water_change(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state
        .dispatcher
        .publish(
            ActuationCommand::new(topics::WATER_CHANGE, "start"),
            "water_change",
            1.0,
        )
        .await;

    Ok(Json(json!({ "status": "success", "data": { "command": "start" } })))
}

/// GET /ws - WebSocket upgrade onto the realtime hub
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Bridge one WebSocket connection to the hub
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = state.realtime.register().await;

    // Forward hub messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Drain incoming frames until the client goes away
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
        conn_id
    });

    let conn_id = tokio::select! {
        _ = send_task => conn_id,
        result = recv_task => result.unwrap_or(conn_id),
    };

    state.realtime.unregister(&conn_id).await;
}
