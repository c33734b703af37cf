//! SessionRecorder - ordered pulse events of the active session

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One detected pulse. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseEvent {
    /// 1-based, reset only at session start
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Reading that triggered the crossing
    pub raw_value: i32,
    /// Seconds since session start
    pub elapsed_secs: f64,
}

/// A rate value reported directly by the device (decoded-rate mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateReading {
    pub timestamp: DateTime<Utc>,
    pub bpm: i32,
}

/// Time from `start` to `now`; clock skew clamps to zero and is logged.
pub fn elapsed_since(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    match (now - start).to_std() {
        Ok(elapsed) => elapsed,
        Err(_) => {
            log::warn!(
                "[SessionRecorder] Clock went backwards: now {} precedes start {}",
                now,
                start
            );
            Duration::ZERO
        }
    }
}

/// Local calendar day of `at`; ages and record filing both use this day.
pub fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// Append-only event store for one session.
#[derive(Debug)]
pub struct SessionRecorder {
    started_at: DateTime<Utc>,
    events: Vec<PulseEvent>,
    readings: Vec<RateReading>,
}

impl SessionRecorder {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            events: Vec::new(),
            readings: Vec::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record a pulse and return the stored event.
    ///
    /// Timestamps are kept non-decreasing: an arrival that precedes the last
    /// event is pinned to the last event's timestamp.
    pub fn append(&mut self, sequence: u64, timestamp: DateTime<Utc>, raw_value: i32) -> &PulseEvent {
        let timestamp = match self.events.last() {
            Some(last) if timestamp < last.timestamp => {
                log::warn!(
                    "[SessionRecorder] Pulse {} arrived out of order ({} < {}), clamping",
                    sequence,
                    timestamp,
                    last.timestamp
                );
                last.timestamp
            }
            _ => timestamp,
        };

        let elapsed_secs = elapsed_since(self.started_at, timestamp).as_secs_f64();
        self.events.push(PulseEvent {
            sequence,
            timestamp,
            raw_value,
            elapsed_secs,
        });
        &self.events[self.events.len() - 1]
    }

    pub fn record_reading(&mut self, timestamp: DateTime<Utc>, bpm: i32) {
        self.readings.push(RateReading { timestamp, bpm });
    }

    pub fn events(&self) -> &[PulseEvent] {
        &self.events
    }

    pub fn readings(&self) -> &[RateReading] {
        &self.readings
    }

    pub fn latest_reading(&self) -> Option<&RateReading> {
        self.readings.last()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.readings.is_empty()
    }

    /// Freeze the recorder, handing over its contents.
    pub fn into_parts(self) -> (Vec<PulseEvent>, Vec<RateReading>) {
        (self.events, self.readings)
    }
}
