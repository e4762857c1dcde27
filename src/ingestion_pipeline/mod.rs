//! IngestionPipeline - per-reading orchestration
//!
//! ## Flow
//!
//! validate -> stamp -> persist -> aggregate -> evaluate -> dispatch
//! -> broadcast raw reading
//!
//! Validation and persistence failures abort the ingest before any
//! downstream side effect: a reading that was not durably recorded is
//! never aggregated, never actuated on, never broadcast. Everything after
//! the persist is best-effort.

use std::sync::Arc;

use chrono::Utc;

use crate::actuation_dispatcher::{topics, ActuationCommand, ActuationDispatcher};
use crate::error::Result;
use crate::metric_aggregator::MetricAggregator;
use crate::models::{FishPayload, FishReading, Metric, PlantPayload, PlantReading};
use crate::realtime_hub::{HubMessage, RealtimeHub};
use crate::telemetry_store::TelemetryStore;
use crate::threshold_evaluator::ThresholdEvaluator;

/// Condition key for the turbidity level trigger
pub const COND_TURBIDITY: &str = "turbidity";
/// Condition key for the grow-light flag trigger
pub const COND_GROWLIGHTS: &str = "growlights";

/// Orchestrates the telemetry path for one incoming reading
pub struct IngestionPipeline {
    store: Arc<dyn TelemetryStore>,
    aggregator: Arc<MetricAggregator>,
    evaluator: Arc<ThresholdEvaluator>,
    dispatcher: Arc<ActuationDispatcher>,
    hub: Arc<RealtimeHub>,
    turbidity_threshold: f64,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        aggregator: Arc<MetricAggregator>,
        evaluator: Arc<ThresholdEvaluator>,
        dispatcher: Arc<ActuationDispatcher>,
        hub: Arc<RealtimeHub>,
        turbidity_threshold: f64,
    ) -> Self {
        Self {
            store,
            aggregator,
            evaluator,
            dispatcher,
            hub,
            turbidity_threshold,
        }
    }

    /// Ingest one plant reading: persist, update rolling windows,
    /// broadcast. Plant metrics carry no threshold conditions today.
    pub async fn ingest_plant(&self, payload: PlantPayload) -> Result<PlantReading> {
        let reading = payload.validate(Utc::now())?;
        self.store.insert_plant(&reading).await?;

        self.track(Metric::PlantPh, reading.ph).await;
        self.track(Metric::Tds, reading.tds).await;
        self.track(Metric::AirTemperature, reading.temperature).await;
        self.track(Metric::Humidity, reading.humidity).await;

        self.hub
            .broadcast(HubMessage::PlantData(reading.clone()))
            .await;

        Ok(reading)
    }

    /// Ingest one fish reading: persist, update rolling windows, run the
    /// turbidity and grow-light conditions, broadcast.
    pub async fn ingest_fish(&self, payload: FishPayload) -> Result<FishReading> {
        let reading = payload.validate(Utc::now())?;
        self.store.insert_fish(&reading).await?;

        // Turbidity drives the water-change actuator on the rolling average.
        match self.aggregator.update(Metric::Turbidity, reading.turbidity).await {
            Ok(average) => {
                if self
                    .evaluator
                    .decide(COND_TURBIDITY, average, self.turbidity_threshold)
                    .await
                {
                    self.dispatcher
                        .publish(
                            ActuationCommand::new(topics::WATER_CHANGE, "start"),
                            COND_TURBIDITY,
                            average,
                        )
                        .await;
                }
            }
            Err(e) => {
                tracing::warn!(metric = %Metric::Turbidity, error = %e, "Aggregation failed")
            }
        }

        self.track(Metric::WaterTemperature, reading.water_temperature)
            .await;
        self.track(Metric::FishPh, reading.ph).await;

        // Grow lights follow the LDR bit, edge-triggered on change with
        // device agreement.
        if let Some(lights_on) = self
            .evaluator
            .observe_flag(COND_GROWLIGHTS, reading.ldr, reading.grow_light_triggered)
            .await
        {
            let payload = if lights_on { "on" } else { "off" };
            self.dispatcher
                .publish(
                    ActuationCommand::new(topics::GROWLIGHTS, payload),
                    COND_GROWLIGHTS,
                    if lights_on { 1.0 } else { 0.0 },
                )
                .await;
        }

        self.hub
            .broadcast(HubMessage::FishData(reading.clone()))
            .await;

        Ok(reading)
    }

    /// Window update for metrics without conditions; failures are logged,
    /// never fatal.
    async fn track(&self, metric: Metric, value: f64) {
        if let Err(e) = self.aggregator.update(metric, value).await {
            tracing::warn!(metric = %metric, error = %e, "Aggregation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mqtt_transport::ActuatorTransport;
    use crate::telemetry_store::{PersistedFish, PersistedPlant};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeStore {
        plant_inserts: AtomicUsize,
        fish_inserts: AtomicUsize,
        fail_inserts: bool,
        /// Newest-first turbidity rows, appended by `insert_fish` like
        /// the real table
        turbidity_rows: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl TelemetryStore for FakeStore {
        async fn insert_plant(&self, _reading: &PlantReading) -> Result<()> {
            if self.fail_inserts {
                return Err(Error::Persistence("write failed".to_string()));
            }
            self.plant_inserts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn insert_fish(&self, reading: &FishReading) -> Result<()> {
            if self.fail_inserts {
                return Err(Error::Persistence("write failed".to_string()));
            }
            self.fish_inserts.fetch_add(1, Ordering::SeqCst);
            self.turbidity_rows.lock().unwrap().insert(0, reading.turbidity);
            Ok(())
        }
        async fn recent_plant(&self, _limit: i64) -> Result<Vec<PersistedPlant>> {
            Ok(Vec::new())
        }
        async fn recent_fish(&self, _limit: i64) -> Result<Vec<PersistedFish>> {
            Ok(Vec::new())
        }
        async fn recent_metric(&self, metric: Metric, limit: i64) -> Result<Vec<f64>> {
            if metric != Metric::Turbidity {
                return Ok(Vec::new());
            }
            Ok(self
                .turbidity_rows
                .lock()
                .unwrap()
                .iter()
                .take(limit as usize)
                .copied()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ActuatorTransport for RecordingTransport {
        async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    struct Harness {
        pipeline: IngestionPipeline,
        store: Arc<FakeStore>,
        transport: Arc<RecordingTransport>,
        hub: Arc<RealtimeHub>,
        aggregator: Arc<MetricAggregator>,
    }

    fn harness(store: FakeStore, turbidity_threshold: f64) -> Harness {
        let store = Arc::new(store);
        let transport = Arc::new(RecordingTransport::default());
        let hub = Arc::new(RealtimeHub::new());
        let aggregator = Arc::new(MetricAggregator::new(
            store.clone() as Arc<dyn TelemetryStore>,
            50,
            Duration::from_millis(500),
        ));
        let evaluator = Arc::new(ThresholdEvaluator::new());
        let dispatcher = Arc::new(ActuationDispatcher::new(
            transport.clone() as Arc<dyn ActuatorTransport>,
            hub.clone(),
        ));
        let pipeline = IngestionPipeline::new(
            store.clone() as Arc<dyn TelemetryStore>,
            aggregator.clone(),
            evaluator,
            dispatcher,
            hub.clone(),
            turbidity_threshold,
        );
        Harness {
            pipeline,
            store,
            transport,
            hub,
            aggregator,
        }
    }

    fn fish_payload(turbidity: f64) -> FishPayload {
        FishPayload {
            turbidity: Some(turbidity),
            water_temperature: Some(26.0),
            ph: Some(7.0),
            ldr: Some(false),
            grow_light_triggered: Some(false),
        }
    }

    #[tokio::test]
    async fn invalid_payload_has_no_side_effects() {
        let h = harness(FakeStore::default(), 250.0);
        let (_id, mut rx) = h.hub.register().await;

        let payload = FishPayload {
            turbidity: None,
            ..fish_payload(0.0)
        };
        let err = h.pipeline.ingest_fish(payload).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));

        assert_eq!(h.store.fish_inserts.load(Ordering::SeqCst), 0);
        assert!(h.transport.published.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn persistence_failure_prevents_actuation_and_broadcast() {
        let h = harness(
            FakeStore {
                fail_inserts: true,
                ..Default::default()
            },
            250.0,
        );
        let (_id, mut rx) = h.hub.register().await;

        let err = h.pipeline.ingest_fish(fish_payload(300.0)).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));

        assert!(h.transport.published.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn turbidity_crossing_fires_once_per_episode() {
        let h = harness(FakeStore::default(), 250.0);
        let (_id, mut rx) = h.hub.register().await;

        // Empty window, first reading: average == 300 > 250 -> fire
        h.pipeline.ingest_fish(fish_payload(300.0)).await.unwrap();
        {
            let published = h.transport.published.lock().unwrap();
            assert_eq!(published.len(), 1);
            assert_eq!(published[0].0, topics::WATER_CHANGE);
            assert_eq!(published[0].1, "start");
        }

        // Actuation broadcast carries the rolling average
        let actuation = rx.recv().await.unwrap();
        assert!(actuation.contains("\"conditionName\":\"turbidity\""));
        assert!(actuation.contains("\"value\":300.0"));
        assert!(actuation.contains("\"triggered\":true"));
        // Raw reading broadcast follows regardless of threshold outcome
        let raw = rx.recv().await.unwrap();
        assert!(raw.contains("fish_data"));

        // Second identical reading: average still > 250 but state is ACTIVE
        h.pipeline.ingest_fish(fish_payload(300.0)).await.unwrap();
        assert_eq!(h.transport.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn turbidity_refire_after_recovery() {
        let h = harness(FakeStore::default(), 250.0);

        h.pipeline.ingest_fish(fish_payload(300.0)).await.unwrap();
        // Drag the rolling average below the threshold
        for _ in 0..10 {
            h.pipeline.ingest_fish(fish_payload(10.0)).await.unwrap();
        }
        // New exceedance episode
        for _ in 0..12 {
            h.pipeline.ingest_fish(fish_payload(500.0)).await.unwrap();
        }

        let published = h.transport.published.lock().unwrap();
        let water_changes = published
            .iter()
            .filter(|(t, _)| t == topics::WATER_CHANGE)
            .count();
        assert_eq!(water_changes, 2);
    }

    #[tokio::test]
    async fn grow_light_flag_change_publishes_command() {
        let h = harness(FakeStore::default(), 250.0);

        // First observation records the flag silently
        h.pipeline.ingest_fish(fish_payload(10.0)).await.unwrap();
        assert!(h.transport.published.lock().unwrap().is_empty());

        // LDR flips to dark and the device acknowledges lights-on
        let mut payload = fish_payload(10.0);
        payload.ldr = Some(true);
        payload.grow_light_triggered = Some(true);
        h.pipeline.ingest_fish(payload).await.unwrap();

        let published = h.transport.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, topics::GROWLIGHTS);
        assert_eq!(published[0].1, "on");
    }

    #[tokio::test]
    async fn plant_ingest_persists_and_broadcasts() {
        let h = harness(FakeStore::default(), 250.0);
        let (_id, mut rx) = h.hub.register().await;

        let payload = PlantPayload {
            ph: Some(6.5),
            tds: Some(450.0),
            temperature: Some(28.0),
            humidity: Some(65.0),
        };
        let reading = h.pipeline.ingest_plant(payload).await.unwrap();
        assert_eq!(reading.tds, 450.0);

        assert_eq!(h.store.plant_inserts.load(Ordering::SeqCst), 1);
        let msg = rx.recv().await.unwrap();
        assert!(msg.contains("plant_data"));
        // No thresholds on plant metrics: nothing published
        assert!(h.transport.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn seeded_history_shifts_the_average() {
        // Prior rows [200, 200]: window seeds to [200, 200], then 320
        // pushes -> average 240 < 250, no fire
        let h = harness(
            FakeStore {
                turbidity_rows: Mutex::new(vec![200.0, 200.0]),
                ..Default::default()
            },
            250.0,
        );

        h.pipeline.ingest_fish(fish_payload(320.0)).await.unwrap();
        assert!(h.transport.published.lock().unwrap().is_empty());

        // Another high reading lifts the average over the line: (200+200+320+330)/4 = 262.5
        h.pipeline.ingest_fish(fish_payload(330.0)).await.unwrap();
        assert_eq!(h.transport.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn seed_excludes_the_reading_being_ingested() {
        // Prior rows [100, 100]; the persisted-then-fetched 400 must be
        // counted once: window [100, 100, 400], average 200
        let h = harness(
            FakeStore {
                turbidity_rows: Mutex::new(vec![100.0, 100.0]),
                ..Default::default()
            },
            210.0,
        );

        h.pipeline.ingest_fish(fish_payload(400.0)).await.unwrap();
        assert_eq!(h.aggregator.average(Metric::Turbidity).await, Some(200.0));
        // 200 < 210: double-counting 400 would have fired a water change
        assert!(h.transport.published.lock().unwrap().is_empty());
    }
}
