//! Anilytics Hub - aquaponics telemetry server
//!
//! Main entry point.

use std::sync::Arc;
use std::time::Duration;

use anilytics_hub::{
    actuation_dispatcher::ActuationDispatcher,
    chat_service::{ChatService, GeminiClient, SessionRepository},
    ingestion_pipeline::IngestionPipeline,
    metric_aggregator::MetricAggregator,
    mqtt_transport::MqttTransport,
    realtime_hub::RealtimeHub,
    state::{AppConfig, AppState},
    telemetry_store::{PgTelemetryStore, TelemetryStore},
    threshold_evaluator::ThresholdEvaluator,
    web_api,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anilytics_hub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Anilytics Hub v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        database_url = %config.database_url,
        mqtt_host = %config.mqtt_host,
        display_timezone = %config.display_timezone,
        turbidity_threshold = config.turbidity_threshold,
        window_capacity = config.window_capacity,
        "Configuration loaded"
    );

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;

    tracing::info!("Database connected");

    let store = Arc::new(PgTelemetryStore::new(pool.clone()));
    store.migrate().await?;

    // MQTT transport + event loop task
    let credentials = config
        .mqtt_username
        .clone()
        .zip(config.mqtt_password.clone());
    let (transport, eventloop) = MqttTransport::connect(
        "anilytics-hub",
        &config.mqtt_host,
        config.mqtt_port,
        credentials,
    );
    let transport = Arc::new(transport);
    tokio::spawn(MqttTransport::drive(transport.connected_flag(), eventloop));
    tracing::info!(
        mqtt_host = %config.mqtt_host,
        mqtt_port = config.mqtt_port,
        "MQTT transport started"
    );

    // Core pipeline components
    let realtime = Arc::new(RealtimeHub::new());
    let aggregator = Arc::new(MetricAggregator::new(
        store.clone() as Arc<dyn TelemetryStore>,
        config.window_capacity,
        Duration::from_millis(config.seed_timeout_ms),
    ));
    let evaluator = Arc::new(ThresholdEvaluator::new());
    let dispatcher = Arc::new(ActuationDispatcher::new(
        transport.clone(),
        realtime.clone(),
    ));
    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone() as Arc<dyn TelemetryStore>,
        aggregator,
        evaluator,
        dispatcher.clone(),
        realtime.clone(),
        config.turbidity_threshold,
    ));
    tracing::info!("Ingestion pipeline initialized");

    // Assistant
    if config.gemini_api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set, assistant replies will fail");
    }
    let chat = Arc::new(ChatService::new(
        GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())?,
        SessionRepository::new(pool.clone()),
    ));

    // Create application state
    let state = AppState {
        pool,
        config: config.clone(),
        store,
        pipeline,
        dispatcher,
        realtime,
        transport,
        chat,
    };

    let app = web_api::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
