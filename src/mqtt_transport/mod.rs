//! MqttTransport - actuator command broker
//!
//! Fire-and-forget publishes to the MQTT broker the actuator devices
//! subscribe to. At-most-once (QoS 0) is sufficient: a missed command is
//! re-attempted naturally by the next qualifying reading.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::error::{Error, Result};

/// Transport consumed by the actuation dispatcher
#[async_trait]
pub trait ActuatorTransport: Send + Sync {
    /// Publish a command payload, fire-and-forget
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// MQTT-backed transport
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttTransport {
    /// Build the client. The returned event loop must be driven by
    /// [`MqttTransport::drive`] from a spawned task.
    pub fn connect(
        client_id: &str,
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
    ) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        if let Some((user, pass)) = credentials {
            options.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(options, 32);
        let transport = Self {
            client,
            connected: Arc::new(AtomicBool::new(false)),
        };
        (transport, eventloop)
    }

    /// Whether the broker connection is currently up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Drive the MQTT event loop, logging reconnects. Runs until the
    /// client is dropped.
    pub async fn drive(connected: Arc<AtomicBool>, mut eventloop: EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected.store(true, Ordering::Relaxed);
                    tracing::info!("MQTT broker connected");
                }
                Ok(_) => {}
                Err(e) => {
                    connected.store(false, Ordering::Relaxed);
                    tracing::warn!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    /// Handle to the connection flag for the event loop task
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }
}

#[async_trait]
impl ActuatorTransport for MqttTransport {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        tracing::debug!(topic = %topic, payload = %payload, "Actuator command queued");
        Ok(())
    }
}
