//! Anilytics Hub
//!
//! Telemetry aggregation and threshold actuation for an aquaponics rig.
//!
//! ## Architecture
//!
//! 1. IngestionPipeline - validate / persist / aggregate / actuate per reading
//! 2. RollingWindow - bounded FIFO of recent samples per metric
//! 3. MetricAggregator - per-metric windows, seeded from history on cold start
//! 4. ThresholdEvaluator - edge-triggered actuation decisions
//! 5. ActuationDispatcher - MQTT command publish + live broadcast
//! 6. TelemetryStore - Postgres persistence for raw readings
//! 7. RealtimeHub - WebSocket fan-out to connected observers
//! 8. ChatService - bounded-context assistant over the same telemetry
//! 9. WebAPI - REST/WebSocket endpoints
//!
//! ## Data flow
//!
//! device -> POST /plant_data | /fish_data -> IngestionPipeline.ingest
//!   -> TelemetryStore -> MetricAggregator -> ThresholdEvaluator
//!   -> [ActuationDispatcher -> MQTT, RealtimeHub] -> actuators/observers

pub mod actuation_dispatcher;
pub mod chat_service;
pub mod error;
pub mod ingestion_pipeline;
pub mod metric_aggregator;
pub mod models;
pub mod mqtt_transport;
pub mod realtime_hub;
pub mod rolling_window;
pub mod state;
pub mod telemetry_store;
pub mod threshold_evaluator;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
