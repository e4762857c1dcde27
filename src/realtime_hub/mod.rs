//! RealtimeHub - live fan-out to connected observers
//!
//! ## Responsibilities
//!
//! - WebSocket connection management
//! - Broadcasting stamped readings as they are ingested
//! - Broadcasting actuation events alongside the MQTT command
//!
//! Delivery is best-effort: each connection gets a bounded channel and a
//! message that does not fit is dropped for that subscriber, so a slow or
//! disconnected client never blocks ingestion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{FishReading, PlantReading};

/// Per-connection buffer; beyond this, messages are dropped for that client
const CONNECTION_BUFFER: usize = 64;

/// Hub message types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum HubMessage {
    PlantData(PlantReading),
    FishData(FishReading),
    Actuation(ActuationMessage),
}

/// Actuation event broadcast to observers when a condition fires
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuationMessage {
    pub condition_name: String,
    pub value: f64,
    pub triggered: bool,
}

struct ClientConnection {
    id: Uuid,
    tx: mpsc::Sender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new client
    pub async fn register(&self) -> (Uuid, mpsc::Receiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, ClientConnection { id, tx });
        }
        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, "Observer connected");
        (id, rx)
    }

    /// Unregister a client
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Observer disconnected");
        }
    }

    /// Broadcast a message to all connected observers.
    ///
    /// Non-blocking: a full per-connection buffer drops the message for
    /// that connection only.
    pub async fn broadcast(&self, message: HubMessage) {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize hub message");
                return;
            }
        };

        let connections = self.connections.read().await;
        for conn in connections.values() {
            if let Err(e) = conn.tx.try_send(json.clone()) {
                tracing::warn!(
                    connection_id = %conn.id,
                    error = %e,
                    "Dropping hub message for slow observer"
                );
            }
        }
    }

    /// Get connection count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
