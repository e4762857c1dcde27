//! ThresholdEvaluator - edge-triggered actuation decisions
//!
//! Tracks one INACTIVE/ACTIVE bit per monitored condition so an actuator
//! fires once per exceedance episode, not once per reading. Only the
//! upward crossing produces a decision; falling back below the threshold
//! resets silently. A second kind of condition compares a boolean sensor
//! bit against its last observed value (the grow-light logic), firing
//! only when the bit changes and the device-reported acknowledgement
//! agrees with the new value.
//!
//! All state is per-process and resets on restart; a missed reset after a
//! crash self-heals on the next observed reading.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Edge-triggered condition state registry
pub struct ThresholdEvaluator {
    /// condition -> currently ACTIVE (last decision was fire)
    active: RwLock<HashMap<&'static str, bool>>,
    /// condition -> last observed flag value
    prev_flags: RwLock<HashMap<&'static str, bool>>,
}

impl ThresholdEvaluator {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            prev_flags: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate a level condition against its threshold.
    ///
    /// Returns `true` exactly when the aggregate crosses from <= threshold
    /// to > threshold (INACTIVE -> ACTIVE). Staying above keeps the
    /// condition ACTIVE without refiring; falling back resets it.
    pub async fn decide(&self, condition: &'static str, average: f64, threshold: f64) -> bool {
        let mut active = self.active.write().await;
        let was_active = active.get(condition).copied().unwrap_or(false);
        let is_active = average > threshold;

        match (was_active, is_active) {
            (false, true) => {
                active.insert(condition, true);
                tracing::info!(
                    condition = %condition,
                    average = average,
                    threshold = threshold,
                    "Threshold crossed, firing actuation"
                );
                true
            }
            (true, false) => {
                active.insert(condition, false);
                tracing::debug!(
                    condition = %condition,
                    average = average,
                    "Condition cleared"
                );
                false
            }
            _ => false,
        }
    }

    /// Evaluate a flag condition against its last observed value.
    ///
    /// Fires with the new value when the flag changed since the previous
    /// observation and the device-reported acknowledgement agrees with it.
    /// The first observation only records the value.
    pub async fn observe_flag(
        &self,
        condition: &'static str,
        value: bool,
        ack: bool,
    ) -> Option<bool> {
        let mut prev_flags = self.prev_flags.write().await;

        match prev_flags.get(condition).copied() {
            None => {
                prev_flags.insert(condition, value);
                None
            }
            Some(p) if p == value => None,
            Some(_) if value == ack => {
                prev_flags.insert(condition, value);
                tracing::info!(
                    condition = %condition,
                    value = value,
                    "Flag changed with device agreement, firing actuation"
                );
                Some(value)
            }
            Some(_) => {
                // Held: the remembered value is left untouched so the
                // change re-evaluates once the device acknowledges it.
                tracing::debug!(
                    condition = %condition,
                    value = value,
                    ack = ack,
                    "Flag changed but device disagrees, holding"
                );
                None
            }
        }
    }
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
