//! RateEstimator - cumulative beats-per-minute
//!
//! The rate is `pulses / elapsed minutes` since session start. It is a coarse
//! cumulative average, not a sliding window: it converges slowly right after
//! start and is only meaningful once `settle` time has elapsed, which
//! [`RateEstimate::settled`] reports.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Instantaneous rate in beats per minute. Zero for a zero-length window.
pub fn instantaneous_rate(pulse_count: u64, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes <= 0.0 {
        return 0.0;
    }
    pulse_count as f64 / minutes
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    pub bpm: f64,
    /// Whether the averaging window is long enough to trust `bpm`
    pub settled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RateEstimator {
    settle: Duration,
}

impl RateEstimator {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    pub fn estimate(&self, pulse_count: u64, elapsed: Duration) -> RateEstimate {
        RateEstimate {
            bpm: instantaneous_rate(pulse_count, elapsed),
            settled: elapsed >= self.settle,
        }
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_is_zero_rate() {
        assert_eq!(instantaneous_rate(0, Duration::ZERO), 0.0);
        assert_eq!(instantaneous_rate(12, Duration::ZERO), 0.0);
    }

    #[test]
    fn cumulative_average() {
        assert!((instantaneous_rate(72, Duration::from_secs(60)) - 72.0).abs() < 1e-9);
        assert!((instantaneous_rate(36, Duration::from_secs(30)) - 72.0).abs() < 1e-9);
        assert!((instantaneous_rate(1, Duration::from_millis(500)) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn settles_after_configured_window() {
        let estimator = RateEstimator::default();
        assert!(!estimator.estimate(10, Duration::from_secs(29)).settled);
        assert!(estimator.estimate(40, Duration::from_secs(30)).settled);
    }
}
