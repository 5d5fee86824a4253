//! Tap-tempo estimation
//!
//! Collects the intervals between user taps and, once enough have arrived,
//! estimates a tempo that ignores the odd early or late tap.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::types::{MAX_BPM, MIN_BPM};

/// Number of recent intervals kept for the estimate
const MAX_INTERVALS: usize = 8;

/// Taps needed before an estimate is produced
const MIN_TAPS: usize = 4;

/// A pause longer than this starts a new tap sequence
const TAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Intervals further than this fraction from the median are outliers
const OUTLIER_TOLERANCE: f64 = 0.25;

/// Statistical tap-tempo estimator
#[derive(Debug, Clone, Default)]
pub struct TempoEstimator {
    last_tap: Option<Instant>,
    intervals: VecDeque<f64>,
}

impl TempoEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tap
    ///
    /// Returns the estimated BPM once at least four taps of the current
    /// sequence have been collected, `None` before that.
    pub fn tap(&mut self, timestamp: Instant) -> Option<f64> {
        let previous = self.last_tap.replace(timestamp);

        let Some(previous) = previous else {
            return None;
        };

        let Some(interval) = timestamp.checked_duration_since(previous) else {
            log::debug!("tap: timestamp went backwards, restarting sequence");
            self.intervals.clear();
            return None;
        };

        if interval.is_zero() || interval > TAP_TIMEOUT {
            self.intervals.clear();
            return None;
        }

        self.intervals.push_back(interval.as_secs_f64());
        while self.intervals.len() > MAX_INTERVALS {
            self.intervals.pop_front();
        }

        if self.tap_count() < MIN_TAPS {
            return None;
        }
        self.estimate()
    }

    /// Taps in the current sequence
    pub fn tap_count(&self) -> usize {
        match self.last_tap {
            Some(_) => self.intervals.len() + 1,
            None => 0,
        }
    }

    /// Forget the current sequence
    pub fn reset(&mut self) {
        self.last_tap = None;
        self.intervals.clear();
    }

    fn estimate(&self) -> Option<f64> {
        let mut sorted: Vec<f64> = self.intervals.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        let inliers: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|i| ((i - median) / median).abs() <= OUTLIER_TOLERANCE)
            .collect();
        if inliers.is_empty() {
            return None;
        }

        let mean = inliers.iter().sum::<f64>() / inliers.len() as f64;
        Some((60.0 / mean).clamp(MIN_BPM, MAX_BPM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap_every(estimator: &mut TempoEstimator, start: Instant, millis: &[u64]) -> Option<f64> {
        let mut t = start;
        let mut result = estimator.tap(t);
        for ms in millis {
            t += Duration::from_millis(*ms);
            result = estimator.tap(t);
        }
        result
    }

    #[test]
    fn test_needs_four_taps() {
        let mut est = TempoEstimator::new();
        let start = Instant::now();
        assert!(est.tap(start).is_none());
        assert!(est.tap(start + Duration::from_millis(500)).is_none());
        assert!(est.tap(start + Duration::from_millis(1000)).is_none());
        let bpm = est.tap(start + Duration::from_millis(1500)).unwrap();
        assert!((bpm - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_outlier_is_ignored() {
        let mut est = TempoEstimator::new();
        let bpm = tap_every(&mut est, Instant::now(), &[500, 500, 900, 500, 500]).unwrap();
        assert!((bpm - 120.0).abs() < 1e-6, "got {}", bpm);
    }

    #[test]
    fn test_long_pause_restarts_sequence() {
        let mut est = TempoEstimator::new();
        let start = Instant::now();
        tap_every(&mut est, start, &[400, 400, 400]);
        assert_eq!(est.tap_count(), 4);

        assert!(est.tap(start + Duration::from_secs(10)).is_none());
        assert_eq!(est.tap_count(), 1);
    }

    #[test]
    fn test_estimate_is_clamped() {
        let mut est = TempoEstimator::new();
        let bpm = tap_every(&mut est, Instant::now(), &[50, 50, 50]).unwrap();
        assert_eq!(bpm, MAX_BPM);
    }
}
