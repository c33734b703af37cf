//! StatisticsAggregator - post-hoc digest of a finalized pulse sequence
//!
//! Pure function of the (chronologically sorted) events: same input, same
//! output, field for field. Fewer than two events yields an explicit
//! degenerate result with every ratio at zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::PulseEvent;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Timing statistics of one session's pulse events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub total_pulses: usize,
    /// Set when there were too few events to compute ratios
    pub degenerate: bool,
    pub duration_secs: f64,
    pub duration_minutes: f64,
    /// Pulses per minute over the whole duration
    pub average_rate_per_minute: f64,
    pub average_rate_per_second: f64,
    pub interval_mean_secs: f64,
    pub interval_min_secs: f64,
    pub interval_max_secs: f64,
    /// Pulse count per one-minute window anchored at the first event
    pub per_minute_counts: Vec<u32>,
    pub active_minutes: usize,
    pub inactive_minutes: usize,
    pub max_per_minute: u32,
    /// Lowest count among minutes with activity
    pub min_active_per_minute: u32,
    /// Mean count over minutes with activity only
    pub mean_active_per_minute: f64,
}

impl SessionStatistics {
    /// Result for sequences too short to compute intervals.
    pub fn degenerate(total_pulses: usize) -> Self {
        Self {
            total_pulses,
            degenerate: true,
            duration_secs: 0.0,
            duration_minutes: 0.0,
            average_rate_per_minute: 0.0,
            average_rate_per_second: 0.0,
            interval_mean_secs: 0.0,
            interval_min_secs: 0.0,
            interval_max_secs: 0.0,
            per_minute_counts: Vec::new(),
            active_minutes: 0,
            inactive_minutes: 0,
            max_per_minute: 0,
            min_active_per_minute: 0,
            mean_active_per_minute: 0.0,
        }
    }
}

/// Seconds from `from` to `to`, zero if `to` precedes `from`.
pub(crate) fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from)
        .to_std()
        .map(|delta| delta.as_secs_f64())
        .unwrap_or(0.0)
}

/// Aggregate a finalized event sequence.
pub fn aggregate(events: &[PulseEvent]) -> SessionStatistics {
    if events.len() < 2 {
        return SessionStatistics::degenerate(events.len());
    }

    let intervals: Vec<f64> = events
        .windows(2)
        .map(|pair| secs_between(pair[0].timestamp, pair[1].timestamp))
        .collect();

    let first = events[0].timestamp;
    let last = events[events.len() - 1].timestamp;
    let duration_secs = secs_between(first, last);
    let duration_minutes = duration_secs / SECONDS_PER_MINUTE;
    let total = events.len();

    let (average_rate_per_minute, average_rate_per_second) = if duration_secs > 0.0 {
        (
            total as f64 / duration_minutes,
            total as f64 / duration_secs,
        )
    } else {
        (0.0, 0.0)
    };

    let interval_mean_secs = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let interval_min_secs = intervals.iter().copied().fold(f64::INFINITY, f64::min);
    let interval_max_secs = intervals.iter().copied().fold(0.0_f64, f64::max);

    let per_minute_counts = per_minute_histogram(events, first, duration_secs);
    let active: Vec<u32> = per_minute_counts
        .iter()
        .copied()
        .filter(|&count| count > 0)
        .collect();
    let active_minutes = active.len();
    let inactive_minutes = per_minute_counts.len() - active_minutes;
    let max_per_minute = per_minute_counts.iter().copied().max().unwrap_or(0);
    let min_active_per_minute = active.iter().copied().min().unwrap_or(0);
    let mean_active_per_minute = if active_minutes > 0 {
        active.iter().map(|&c| f64::from(c)).sum::<f64>() / active_minutes as f64
    } else {
        0.0
    };

    SessionStatistics {
        total_pulses: total,
        degenerate: false,
        duration_secs,
        duration_minutes,
        average_rate_per_minute,
        average_rate_per_second,
        interval_mean_secs,
        interval_min_secs,
        interval_max_secs,
        per_minute_counts,
        active_minutes,
        inactive_minutes,
        max_per_minute,
        min_active_per_minute,
        mean_active_per_minute,
    }
}

/// `floor(duration / 60) + 1` one-minute buckets, `[start + m, start + m + 1)`.
fn per_minute_histogram(
    events: &[PulseEvent],
    first: DateTime<Utc>,
    duration_secs: f64,
) -> Vec<u32> {
    let buckets = (duration_secs / SECONDS_PER_MINUTE).floor() as usize + 1;
    let mut counts = vec![0u32; buckets];
    for event in events {
        let offset = secs_between(first, event.timestamp);
        let index = ((offset / SECONDS_PER_MINUTE).floor() as usize).min(buckets - 1);
        counts[index] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    fn events_at(offsets_ms: &[i64]) -> Vec<PulseEvent> {
        offsets_ms
            .iter()
            .enumerate()
            .map(|(idx, &ms)| PulseEvent {
                sequence: idx as u64 + 1,
                timestamp: base() + Duration::milliseconds(ms),
                raw_value: 2500,
                elapsed_secs: ms as f64 / 1000.0,
            })
            .collect()
    }

    #[test]
    fn empty_and_single_are_degenerate() {
        let empty = aggregate(&[]);
        assert!(empty.degenerate);
        assert_eq!(empty.total_pulses, 0);
        assert_eq!(empty.average_rate_per_minute, 0.0);
        assert_eq!(empty.interval_mean_secs, 0.0);

        let single = aggregate(&events_at(&[0]));
        assert!(single.degenerate);
        assert_eq!(single.total_pulses, 1);
        assert_eq!(single.interval_min_secs, 0.0);
        assert!(single.per_minute_counts.is_empty());
    }

    #[test]
    fn intervals_and_rates() {
        let stats = aggregate(&events_at(&[0, 800, 1800, 3000]));
        assert!(!stats.degenerate);
        assert_eq!(stats.total_pulses, 4);
        assert!((stats.duration_secs - 3.0).abs() < 1e-9);
        assert!((stats.interval_mean_secs - 1.0).abs() < 1e-9);
        assert!((stats.interval_min_secs - 0.8).abs() < 1e-9);
        assert!((stats.interval_max_secs - 1.2).abs() < 1e-9);
        assert!((stats.average_rate_per_minute - 80.0).abs() < 1e-9);
        assert!((stats.average_rate_per_second - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.per_minute_counts, vec![4]);
    }

    #[test]
    fn identical_timestamps_do_not_divide_by_zero() {
        let stats = aggregate(&events_at(&[500, 500]));
        assert_eq!(stats.duration_secs, 0.0);
        assert_eq!(stats.average_rate_per_minute, 0.0);
        assert_eq!(stats.per_minute_counts, vec![2]);
    }

    #[test]
    fn histogram_skips_empty_minutes_in_active_average() {
        // minute 0: 3 pulses, minute 1: none, minute 2: 1 pulse at exactly 120s
        let stats = aggregate(&events_at(&[0, 1_000, 2_000, 120_000]));
        assert_eq!(stats.per_minute_counts, vec![3, 0, 1]);
        assert_eq!(stats.active_minutes, 2);
        assert_eq!(stats.inactive_minutes, 1);
        assert_eq!(stats.max_per_minute, 3);
        assert_eq!(stats.min_active_per_minute, 1);
        assert!((stats.mean_active_per_minute - 2.0).abs() < 1e-9);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let events = events_at(&[0, 733, 1_519, 2_287, 61_004, 61_950, 125_001]);
        let first = serde_json::to_string(&aggregate(&events)).unwrap();
        let second = serde_json::to_string(&aggregate(&events)).unwrap();
        assert_eq!(first, second);
    }
}
