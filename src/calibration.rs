//! Calibration sample recorder.
//!
//! Stores (screen point, raw sensor point) pairs for an external gaze
//! estimator. No fitting happens here.

use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;

/// A recorded calibration pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    /// Target the user was asked to look at (screen pixels).
    pub screen_x: f64,
    pub screen_y: f64,
    /// Raw sensor reading at that moment (e.g. pupil centre in camera pixels).
    pub raw_x: f64,
    pub raw_y: f64,
    pub timestamp_s: f64,
}

/// Append-only sample collection, cleared only in bulk.
pub struct CalibrationStore {
    clock: Arc<dyn Clock>,
    samples: Vec<CalibrationSample>,
}

impl CalibrationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            samples: Vec::new(),
        }
    }

    /// Record a pair, stamped with the current wall-clock time.
    pub fn add_sample(&mut self, screen_x: f64, screen_y: f64, raw_x: f64, raw_y: f64) {
        self.samples.push(CalibrationSample {
            screen_x,
            screen_y,
            raw_x,
            raw_y,
            timestamp_s: self.clock.unix_secs(),
        });
        debug!(
            "Calibration sample {}: screen ({:.1}, {:.1}) raw ({:.2}, {:.2})",
            self.samples.len(),
            screen_x,
            screen_y,
            raw_x,
            raw_y
        );
    }

    pub fn clear(&mut self) {
        info!("Calibration data cleared ({} samples)", self.samples.len());
        self.samples.clear();
    }

    pub fn all(&self) -> &[CalibrationSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    #[test]
    fn test_samples_recorded_in_order() {
        let clock = Arc::new(TestClock::new());
        clock.set_unix_secs(100.0);
        let mut store = CalibrationStore::new(clock.clone());
        assert!(store.is_empty());

        store.add_sample(0.0, 0.0, 310.0, 240.0);
        clock.advance_secs(0.5);
        store.add_sample(1920.0, 1080.0, 330.0, 250.0);

        assert_eq!(store.len(), 2);
        let all = store.all();
        assert_eq!(all[0].raw_x, 310.0);
        assert_eq!(all[0].timestamp_s, 100.0);
        assert_eq!(all[1].screen_x, 1920.0);
        assert!((all[1].timestamp_s - 100.5).abs() < 1e-9);
    }

    #[test]
    fn test_clear_leaves_store_reusable() {
        let clock = Arc::new(TestClock::new());
        let mut store = CalibrationStore::new(clock);
        store.add_sample(1.0, 2.0, 3.0, 4.0);
        store.clear();
        assert!(store.is_empty());
        store.add_sample(5.0, 6.0, 7.0, 8.0);
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.all()[0].screen_x, 5.0);
    }
}
