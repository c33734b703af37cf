//! SessionSummary and the persisted SessionRecord
//!
//! A summary is a pure function of the frozen session: its bounds, events,
//! rate readings and the subject metrics captured at start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::energy;
use crate::analysis::statistics::{aggregate, secs_between, SessionStatistics};
use crate::analysis::zones::{self, Zone};
use crate::session::live::round_tenth;
use crate::session::profile::{Profile, SubjectMetrics};
use crate::session::recorder::{elapsed_since, PulseEvent, RateReading};

/// Digest of device-reported rates (decoded-rate mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedRate {
    pub count: usize,
    pub mean: f64,
    pub min: i32,
    pub max: i32,
}

impl ReportedRate {
    fn from_readings(readings: &[RateReading]) -> Option<Self> {
        let count = readings.len();
        if count == 0 {
            return None;
        }
        let sum: i64 = readings.iter().map(|r| i64::from(r.bpm)).sum();
        Some(Self {
            count,
            mean: sum as f64 / count as f64,
            min: readings.iter().map(|r| r.bpm).min().unwrap_or(0),
            max: readings.iter().map(|r| r.bpm).max().unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Start to stop
    pub wall_secs: f64,
    /// First to last pulse (or reading); rate and energy use this span
    pub duration_secs: f64,
    pub total_pulses: usize,
    /// Beats per minute over the whole session, rounded to 0.1
    pub average_rate: f64,
    pub max_rate: f64,
    pub percent_of_max: f64,
    /// kcal, rounded to 0.1
    pub energy_kcal: f64,
    /// Zone of the session's average rate
    pub dominant_zone: Zone,
    pub dominant_zone_name: String,
    pub statistics: SessionStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_rate: Option<ReportedRate>,
}

impl SessionSummary {
    pub fn compute(
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        events: &[PulseEvent],
        readings: &[RateReading],
        subject: &SubjectMetrics,
    ) -> Self {
        let statistics = aggregate(events);
        let reported_rate = ReportedRate::from_readings(readings);

        // Edge sessions are measured first pulse to last; decoded sessions
        // first reading to last.
        let (duration_secs, average_rate) = match (&reported_rate, events.is_empty()) {
            (Some(reported), true) => (reading_span_secs(readings), reported.mean),
            _ => (statistics.duration_secs, statistics.average_rate_per_minute),
        };

        let dominant_zone = zones::classify(average_rate, subject.max_rate);
        let percent_of_max = zones::percent_of_max(average_rate, subject.max_rate).unwrap_or(0.0);
        let energy_kcal = energy::estimate(
            average_rate,
            duration_secs / 60.0,
            subject.biometrics.as_ref(),
        );

        Self {
            started_at,
            ended_at,
            wall_secs: elapsed_since(started_at, ended_at).as_secs_f64(),
            duration_secs,
            total_pulses: events.len(),
            average_rate: round_tenth(average_rate),
            max_rate: subject.max_rate,
            percent_of_max: round_tenth(percent_of_max),
            energy_kcal: round_tenth(energy_kcal),
            dominant_zone,
            dominant_zone_name: dominant_zone.name().to_string(),
            statistics,
            reported_rate,
        }
    }
}

fn reading_span_secs(readings: &[RateReading]) -> f64 {
    match (readings.first(), readings.last()) {
        (Some(first), Some(last)) => secs_between(first.timestamp, last.timestamp),
        _ => 0.0,
    }
}

/// What the persistence collaborator receives per stopped session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub summary: SessionSummary,
    pub profile: Profile,
    pub events: Vec<PulseEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readings: Vec<RateReading>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::energy::Biometrics;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, 18, 30, 0).unwrap()
    }

    fn subject() -> SubjectMetrics {
        SubjectMetrics {
            age_years: Some(40),
            max_rate: 180.0,
            biometrics: Some(Biometrics {
                mass_kg: 75.0,
                age_years: 40.0,
                is_male: true,
            }),
        }
    }

    fn pulses(count: u64, every_ms: i64) -> Vec<PulseEvent> {
        (1..=count)
            .map(|seq| {
                let offset = Duration::milliseconds(every_ms * seq as i64);
                PulseEvent {
                    sequence: seq,
                    timestamp: start() + offset,
                    raw_value: 2600,
                    elapsed_secs: offset.num_milliseconds() as f64 / 1000.0,
                }
            })
            .collect()
    }

    #[test]
    fn summary_of_steady_session() {
        let events = pulses(120, 500);
        let end = start() + Duration::seconds(60);
        let summary = SessionSummary::compute(start(), end, &events, &[], &subject());

        // 120 pulses from 0.5 s to 60 s
        assert_eq!(summary.total_pulses, 120);
        assert_eq!(summary.wall_secs, 60.0);
        assert!((summary.duration_secs - 59.5).abs() < 1e-9);
        assert_eq!(summary.duration_secs, summary.statistics.duration_secs);
        assert_eq!(summary.average_rate, 121.0);
        assert_eq!(summary.dominant_zone, Zone::FatBurn);
        assert_eq!(summary.percent_of_max, 67.2);
        assert!(summary.energy_kcal > 0.0);
        assert!((summary.statistics.interval_mean_secs - 0.5).abs() < 1e-9);
        assert!(summary.reported_rate.is_none());
    }

    #[test]
    fn summary_is_pure() {
        let events = pulses(17, 730);
        let end = start() + Duration::seconds(20);
        let a = SessionSummary::compute(start(), end, &events, &[], &subject());
        let b = SessionSummary::compute(start(), end, &events, &[], &subject());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn reported_rates_drive_decoded_sessions() {
        let readings: Vec<RateReading> = [70, 74, 78]
            .iter()
            .enumerate()
            .map(|(i, &bpm)| RateReading {
                timestamp: start() + Duration::seconds(i as i64 + 1),
                bpm,
            })
            .collect();
        let end = start() + Duration::seconds(120);
        let summary = SessionSummary::compute(start(), end, &[], &readings, &subject());

        assert_eq!(summary.total_pulses, 0);
        assert_eq!(summary.average_rate, 74.0);
        assert_eq!(summary.duration_secs, 2.0);
        assert_eq!(summary.wall_secs, 120.0);
        let reported = summary.reported_rate.unwrap();
        assert_eq!((reported.min, reported.max, reported.count), (70, 78, 3));
        assert!(summary.statistics.degenerate);
    }

    #[test]
    fn single_event_is_degenerate_but_valid() {
        let events = pulses(1, 1000);
        let summary =
            SessionSummary::compute(start(), start() + Duration::seconds(5), &events, &[], &subject());
        assert!(summary.statistics.degenerate);
        assert_eq!(summary.total_pulses, 1);
        assert_eq!(summary.average_rate, 0.0);
        assert_eq!(summary.duration_secs, 0.0);
        assert_eq!(summary.energy_kcal, 0.0);
        assert_eq!(summary.wall_secs, 5.0);
    }

    #[test]
    fn rate_uses_pulse_span_not_wall_time() {
        // 11 pulses from 10 s to 20 s, stopped at 60 s
        let events: Vec<PulseEvent> = (0..11)
            .map(|i| PulseEvent {
                sequence: i + 1,
                timestamp: start() + Duration::seconds(10 + i as i64),
                raw_value: 2600,
                elapsed_secs: (10 + i) as f64,
            })
            .collect();
        let end = start() + Duration::seconds(60);
        let summary = SessionSummary::compute(start(), end, &events, &[], &subject());

        assert_eq!(summary.wall_secs, 60.0);
        assert_eq!(summary.duration_secs, 10.0);
        assert_eq!(summary.statistics.duration_secs, 10.0);
        assert_eq!(summary.average_rate, 66.0);
        assert!((summary.statistics.average_rate_per_minute - 66.0).abs() < 1e-9);
        assert_eq!(summary.dominant_zone, zones::classify(66.0, 180.0));
    }
}
