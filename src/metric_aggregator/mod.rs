//! MetricAggregator - rolling statistics per tracked metric
//!
//! ## Responsibilities
//!
//! - Own one rolling window per metric
//! - Seed each window once per process from persisted history on cold start
//! - Serialize updates per metric while keeping metrics independent
//!
//! Each metric gets its own `Mutex`, so turbidity updates never block
//! humidity updates. The history fetch for seeding runs with the metric
//! lock released and is bounded by a timeout; on timeout or store failure
//! the window degrades to empty and statistics start from the current
//! reading.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::error::Result;
use crate::models::Metric;
use crate::rolling_window::RollingWindow;
use crate::telemetry_store::TelemetryStore;

struct WindowCell {
    window: RollingWindow,
    seeded: bool,
}

/// Per-metric rolling windows with one-shot history seeding
pub struct MetricAggregator {
    cells: RwLock<HashMap<Metric, Arc<Mutex<WindowCell>>>>,
    store: Arc<dyn TelemetryStore>,
    capacity: usize,
    seed_timeout: Duration,
}

impl MetricAggregator {
    pub fn new(store: Arc<dyn TelemetryStore>, capacity: usize, seed_timeout: Duration) -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            store,
            capacity,
            seed_timeout,
        }
    }

    /// Push one sample and return the current rolling average.
    ///
    /// Callers persist the reading before updating, so on a cold start
    /// the newest persisted row already holds the value being pushed
    /// here. The one-shot seed fetches one extra row and discards the
    /// newest, leaving exactly the history that preceded this reading;
    /// the fresh sample is never counted twice.
    pub async fn update(&self, metric: Metric, value: f64) -> Result<f64> {
        let cell = self.cell(metric).await;

        let mut guard = cell.lock().await;
        if !guard.seeded {
            // Fetch history without holding the metric lock; another
            // updater may win the race, so re-check after re-acquiring.
            drop(guard);
            let history = self.fetch_history(metric).await;
            guard = cell.lock().await;
            if !guard.seeded {
                if guard.window.is_empty() && !history.is_empty() {
                    guard.window.seed(&history)?;
                    tracing::info!(
                        metric = %metric,
                        seeded = history.len(),
                        "Window seeded from history"
                    );
                }
                guard.seeded = true;
            }
        }

        guard.window.push(value);
        guard.window.average()
    }

    /// Current average without pushing, if the metric has samples
    pub async fn average(&self, metric: Metric) -> Option<f64> {
        let cells = self.cells.read().await;
        let cell = cells.get(&metric)?;
        let guard = cell.lock().await;
        guard.window.average().ok()
    }

    async fn cell(&self, metric: Metric) -> Arc<Mutex<WindowCell>> {
        {
            let cells = self.cells.read().await;
            if let Some(cell) = cells.get(&metric) {
                return cell.clone();
            }
        }
        let mut cells = self.cells.write().await;
        cells
            .entry(metric)
            .or_insert_with(|| {
                Arc::new(Mutex::new(WindowCell {
                    window: RollingWindow::new(self.capacity),
                    seeded: false,
                }))
            })
            .clone()
    }

    /// History for seeding, chronological order, minus the newest row
    /// (the just-persisted reading that triggered this seed). Failures
    /// and timeouts degrade to an empty history rather than blocking
    /// ingestion.
    async fn fetch_history(&self, metric: Metric) -> Vec<f64> {
        let fetch = self
            .store
            .recent_metric(metric, self.capacity as i64 + 1);

        match tokio::time::timeout(self.seed_timeout, fetch).await {
            Ok(Ok(mut newest_first)) => {
                if !newest_first.is_empty() {
                    newest_first.remove(0);
                }
                newest_first.reverse();
                newest_first
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    metric = %metric,
                    error = %e,
                    "History fetch failed, starting from empty window"
                );
                Vec::new()
            }
            Err(_) => {
                let e = crate::error::Error::SeedFetchTimeout(self.seed_timeout.as_millis() as u64);
                tracing::warn!(
                    metric = %metric,
                    error = %e,
                    "History fetch timed out, starting from empty window"
                );
                Vec::new()
            }
        }
    }
}
