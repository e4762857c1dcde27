//! RollingWindow - bounded FIFO of recent samples
//!
//! Fixed-capacity buffer over the most recent N numeric samples, in
//! arrival order. The running sum keeps `average()` O(1) and never stale.

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Default capacity: the last 50 readings per metric
pub const DEFAULT_CAPACITY: usize = 50;

/// Fixed-capacity FIFO of numeric samples with a running average
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl RollingWindow {
    /// Create an empty window. Capacity must be non-zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Append one sample, evicting the oldest when full
    pub fn push(&mut self, value: f64) {
        if self.samples.len() >= self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
            }
        }
        self.samples.push_back(value);
        self.sum += value;
    }

    /// Arithmetic mean of the current contents
    pub fn average(&self) -> Result<f64> {
        if self.samples.is_empty() {
            return Err(Error::EmptyWindow);
        }
        Ok(self.sum / self.samples.len() as f64)
    }

    /// Replace contents wholesale from chronological history.
    ///
    /// Only valid on an empty window; seeding a non-empty window is a
    /// programming error. Values beyond capacity are truncated to the
    /// most recent N.
    pub fn seed(&mut self, values: &[f64]) -> Result<()> {
        if !self.samples.is_empty() {
            return Err(Error::Internal(
                "rolling window seeded while non-empty".to_string(),
            ));
        }
        let start = values.len().saturating_sub(self.capacity);
        for &v in &values[start..] {
            self.push(v);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_pushed_values() {
        let mut w = RollingWindow::new(10);
        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        assert_eq!(w.average().unwrap(), 2.0);
    }

    #[test]
    fn empty_window_has_no_average() {
        let w = RollingWindow::new(10);
        assert!(matches!(w.average(), Err(Error::EmptyWindow)));
    }

    #[test]
    fn overflow_evicts_oldest_in_arrival_order() {
        let mut w = RollingWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        // Retains exactly [3, 4, 5]
        assert_eq!(w.average().unwrap(), 4.0);
    }

    #[test]
    fn long_sequence_average_matches_last_n() {
        let mut w = RollingWindow::new(50);
        for i in 0..200 {
            w.push(i as f64);
        }
        // Last 50 values are 150..=199
        let expected: f64 = (150..200).map(|i| i as f64).sum::<f64>() / 50.0;
        assert!((w.average().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn seed_truncates_to_most_recent() {
        let mut w = RollingWindow::new(3);
        w.seed(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.average().unwrap(), 4.0);
    }

    #[test]
    fn seed_then_push_equals_individual_pushes() {
        let history = [10.0, 20.0, 30.0];

        let mut seeded = RollingWindow::new(50);
        seeded.seed(&history).unwrap();
        seeded.push(40.0);

        let mut pushed = RollingWindow::new(50);
        for v in history {
            pushed.push(v);
        }
        pushed.push(40.0);

        assert_eq!(seeded.len(), pushed.len());
        assert_eq!(seeded.average().unwrap(), pushed.average().unwrap());
    }

    #[test]
    fn seed_on_non_empty_window_is_rejected() {
        let mut w = RollingWindow::new(3);
        w.push(1.0);
        let err = w.seed(&[2.0]).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        // Window contents untouched
        assert_eq!(w.len(), 1);
        assert_eq!(w.average().unwrap(), 1.0);
    }
}
