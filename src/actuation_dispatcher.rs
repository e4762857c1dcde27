//! ActuationDispatcher - command publish + observer broadcast
//!
//! One fired decision becomes exactly one MQTT command and one realtime
//! broadcast. The two sends are independent: failure of either is logged
//! and swallowed, never failing the ingest that produced the decision.
//! There are no retries; the physical condition is re-evaluated on the
//! next reading.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::mqtt_transport::ActuatorTransport;
use crate::realtime_hub::{ActuationMessage, HubMessage, RealtimeHub};

/// Actuator command topics
pub mod topics {
    pub const WATER_CHANGE: &str = "anilytics/actuators/water_change";
    pub const GROWLIGHTS: &str = "anilytics/actuators/growlights";
    pub const FEEDER: &str = "anilytics/actuators/feeder";
}

/// Outbound actuator instruction
#[derive(Debug, Clone)]
pub struct ActuationCommand {
    pub topic: &'static str,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl ActuationCommand {
    pub fn new(topic: &'static str, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Publishes decided actuations to the broker and the realtime hub
pub struct ActuationDispatcher {
    transport: Arc<dyn ActuatorTransport>,
    hub: Arc<RealtimeHub>,
}

impl ActuationDispatcher {
    pub fn new(transport: Arc<dyn ActuatorTransport>, hub: Arc<RealtimeHub>) -> Self {
        Self { transport, hub }
    }

    /// Publish one command and notify observers. Best-effort on both
    /// sides; an MQTT failure does not suppress the broadcast.
    pub async fn publish(&self, command: ActuationCommand, condition: &str, value: f64) {
        if let Err(e) = self
            .transport
            .publish(command.topic, &command.payload)
            .await
        {
            tracing::warn!(
                topic = %command.topic,
                condition = %condition,
                error = %e,
                "Actuator publish failed, will retry on next crossing"
            );
        } else {
            tracing::info!(
                topic = %command.topic,
                payload = %command.payload,
                condition = %condition,
                value = value,
                "Actuator command published"
            );
        }

        self.hub
            .broadcast(HubMessage::Actuation(ActuationMessage {
                condition_name: condition.to_string(),
                value,
                triggered: true,
            }))
            .await;
    }
}
