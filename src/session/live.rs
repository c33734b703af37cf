// LiveStats: the snapshot published to readers while a session runs

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::energy;
use crate::analysis::rate::RateEstimate;
use crate::analysis::zones::{self, Zone};
use crate::session::profile::SubjectMetrics;

/// Whole snapshot; always replaced, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStats {
    pub measuring: bool,
    pub sensor_connected: bool,
    pub pulse_count: u64,
    /// Beats per minute, truncated
    pub heart_rate: u32,
    pub rate_settled: bool,
    /// kcal, rounded to 0.1
    pub calories: f64,
    pub zone: Zone,
    pub zone_name: String,
    pub zone_color: String,
    /// HH:MM:SS
    pub elapsed: String,
    pub elapsed_secs: f64,
    pub max_rate: f64,
    /// Rounded to 0.1
    pub percent_of_max: f64,
    pub last_reading: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for LiveStats {
    fn default() -> Self {
        Self::idle(false, None)
    }
}

/// Inputs for one measuring snapshot.
#[derive(Debug, Clone, Copy)]
pub struct LiveInputs<'a> {
    pub pulse_count: u64,
    pub elapsed: Duration,
    pub rate: RateEstimate,
    pub subject: &'a SubjectMetrics,
    pub last_reading: Option<i32>,
    pub sensor_connected: bool,
    pub now: DateTime<Utc>,
}

impl LiveStats {
    /// Snapshot shown when no session is active.
    pub fn idle(sensor_connected: bool, now: Option<DateTime<Utc>>) -> Self {
        let zone = Zone::NoData;
        Self {
            measuring: false,
            sensor_connected,
            pulse_count: 0,
            heart_rate: 0,
            rate_settled: false,
            calories: 0.0,
            zone,
            zone_name: zone.name().to_string(),
            zone_color: zone.color().to_string(),
            elapsed: format_elapsed(Duration::ZERO),
            elapsed_secs: 0.0,
            max_rate: 0.0,
            percent_of_max: 0.0,
            last_reading: None,
            updated_at: now,
        }
    }

    /// Derive a measuring snapshot.
    pub fn measuring(inputs: LiveInputs<'_>) -> Self {
        let heart_rate = truncate_rate(inputs.rate.bpm);
        let rate = f64::from(heart_rate);
        let max_rate = inputs.subject.max_rate;

        let zone = zones::classify(rate, max_rate);
        let percent = zones::percent_of_max(rate, max_rate).unwrap_or(0.0);
        let minutes = inputs.elapsed.as_secs_f64() / 60.0;
        let calories = energy::estimate(rate, minutes, inputs.subject.biometrics.as_ref());

        Self {
            measuring: true,
            sensor_connected: inputs.sensor_connected,
            pulse_count: inputs.pulse_count,
            heart_rate,
            rate_settled: inputs.rate.settled,
            calories: round_tenth(calories),
            zone,
            zone_name: zone.name().to_string(),
            zone_color: zone.color().to_string(),
            elapsed: format_elapsed(inputs.elapsed),
            elapsed_secs: inputs.elapsed.as_secs_f64(),
            max_rate,
            percent_of_max: round_tenth(percent),
            last_reading: inputs.last_reading,
            updated_at: Some(inputs.now),
        }
    }
}

/// Format a duration as `HH:MM:SS`; hours keep counting past 24.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn truncate_rate(bpm: f64) -> u32 {
    if bpm.is_finite() && bpm > 0.0 {
        bpm.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::energy::Biometrics;

    fn subject() -> SubjectMetrics {
        SubjectMetrics {
            age_years: Some(30),
            max_rate: 190.0,
            biometrics: Some(Biometrics {
                mass_kg: 70.0,
                age_years: 30.0,
                is_male: true,
            }),
        }
    }

    #[test]
    fn elapsed_format() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_millis(61_999)), "00:01:01");
        assert_eq!(format_elapsed(Duration::from_secs(3 * 3600 + 5)), "03:00:05");
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn idle_snapshot_has_no_zone() {
        let idle = LiveStats::default();
        assert!(!idle.measuring);
        assert_eq!(idle.zone_name, "No data");
        assert_eq!(idle.elapsed, "00:00:00");
    }

    #[test]
    fn measuring_snapshot_derivations() {
        let subject = subject();
        let stats = LiveStats::measuring(LiveInputs {
            pulse_count: 95,
            elapsed: Duration::from_secs(60),
            rate: RateEstimate {
                bpm: 95.0,
                settled: true,
            },
            subject: &subject,
            last_reading: Some(2400),
            sensor_connected: true,
            now: Utc::now(),
        });
        assert_eq!(stats.heart_rate, 95);
        assert_eq!(stats.percent_of_max, 50.0);
        assert_eq!(stats.zone, Zone::WarmUp);
        assert_eq!(stats.zone_color, "#3B82F6");
        assert_eq!(stats.elapsed, "00:01:00");
        let expected = (-55.0969 + 0.6309 * 95.0 + 0.1988 * 70.0 + 0.2017 * 30.0) / 4.184;
        assert_eq!(stats.calories, round_tenth(expected));
    }

    #[test]
    fn zero_rate_is_resting() {
        let subject = subject();
        let stats = LiveStats::measuring(LiveInputs {
            pulse_count: 0,
            elapsed: Duration::ZERO,
            rate: RateEstimate {
                bpm: 0.0,
                settled: false,
            },
            subject: &subject,
            last_reading: None,
            sensor_connected: false,
            now: Utc::now(),
        });
        assert_eq!(stats.zone, Zone::Resting);
        assert_eq!(stats.calories, 0.0);
        assert_eq!(stats.heart_rate, 0);
    }

    #[test]
    fn rate_is_truncated_not_rounded() {
        assert_eq!(truncate_rate(72.9), 72);
        assert_eq!(truncate_rate(f64::NAN), 0);
        assert_eq!(truncate_rate(-4.0), 0);
    }
}
