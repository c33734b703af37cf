//! SessionController - idle → measuring → idle
//!
//! Owns the detector and recorder of the active session. It is not
//! synchronized itself; `SessionManager` wraps it in the one mutex that
//! serializes the sample path against start/stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::edge::EdgeDetector;
use crate::analysis::rate::{RateEstimate, RateEstimator};
use crate::analysis::validator::Sample;
use crate::config::{DetectionConfig, SignalMode};
use crate::error::SessionError;
use crate::session::live::{LiveInputs, LiveStats};
use crate::session::profile::{Profile, SubjectMetrics};
use crate::session::recorder::{elapsed_since, local_day, PulseEvent, SessionRecorder};
use crate::session::summary::{SessionRecord, SessionSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Measuring,
}

/// What the sample path did with one validated sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// No session is active; the sample was dropped
    Ignored,
    NoPulse,
    Pulse(PulseEvent),
    /// Decoded-rate mode: the reading was recorded as a rate
    Reading(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    Completed(SessionRecord),
    /// Stopped with nothing recorded; nothing is persisted
    NoData,
}

#[derive(Debug)]
struct ActiveSession {
    profile: Profile,
    subject: SubjectMetrics,
    recorder: SessionRecorder,
    detector: EdgeDetector,
    last_reading: Option<i32>,
}

#[derive(Debug)]
pub struct SessionController {
    detection: DetectionConfig,
    rate: RateEstimator,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(detection: DetectionConfig) -> Self {
        let rate = RateEstimator::new(std::time::Duration::from_secs(detection.settle_secs));
        Self {
            detection,
            rate,
            active: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.active.is_some() {
            ControllerState::Measuring
        } else {
            ControllerState::Idle
        }
    }

    pub fn is_measuring(&self) -> bool {
        self.active.is_some()
    }

    pub fn pulse_count(&self) -> u64 {
        self.active
            .as_ref()
            .map(|session| session.detector.pulse_count())
            .unwrap_or(0)
    }

    /// Begin measuring with a validated profile.
    ///
    /// Clears the recorder and resets the detector; refused while measuring.
    pub fn start(&mut self, profile: Profile, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyMeasuring);
        }
        let today = local_day(now);
        profile.validate(today)?;

        let mut detector = EdgeDetector::new();
        detector.reset();
        let subject = profile.metrics(today);

        log::info!(
            "[SessionController] Session started for {} (max rate {:.0})",
            profile.display_name(),
            subject.max_rate
        );
        self.active = Some(ActiveSession {
            profile,
            subject,
            recorder: SessionRecorder::new(now),
            detector,
            last_reading: None,
        });
        Ok(())
    }

    /// Feed one validated sample. Idle samples are discarded without error.
    pub fn on_sample(&mut self, sample: &Sample) -> SampleOutcome {
        let Some(session) = self.active.as_mut() else {
            return SampleOutcome::Ignored;
        };
        session.last_reading = Some(sample.value);

        match self.detection.signal_mode {
            SignalMode::RawAnalog => {
                let edge = session
                    .detector
                    .on_sample(sample.value, self.detection.threshold);
                if !edge.is_pulse {
                    return SampleOutcome::NoPulse;
                }
                let event = session
                    .recorder
                    .append(edge.pulse_count, sample.received_at, sample.value)
                    .clone();
                log::debug!(
                    "[SessionController] Pulse {} (raw {})",
                    event.sequence,
                    event.raw_value
                );
                SampleOutcome::Pulse(event)
            }
            SignalMode::DecodedRate => {
                session
                    .recorder
                    .record_reading(sample.received_at, sample.value);
                SampleOutcome::Reading(sample.value)
            }
        }
    }

    /// Freeze the session and summarize it; refused while idle.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<StopOutcome, SessionError> {
        let session = self.active.take().ok_or(SessionError::NotMeasuring)?;

        if session.recorder.is_empty() {
            log::info!("[SessionController] Session stopped with no data to save");
            return Ok(StopOutcome::NoData);
        }

        let started_at = session.recorder.started_at();
        let (events, readings) = session.recorder.into_parts();
        let summary =
            SessionSummary::compute(started_at, now, &events, &readings, &session.subject);
        log::info!(
            "[SessionController] Session stopped: {} pulses over {:.1}s, avg {:.1} bpm",
            summary.total_pulses,
            summary.duration_secs,
            summary.average_rate
        );

        Ok(StopOutcome::Completed(SessionRecord {
            summary,
            profile: session.profile,
            events,
            readings,
        }))
    }

    /// Current snapshot for readers.
    pub fn live_stats(&self, now: DateTime<Utc>, sensor_connected: bool) -> LiveStats {
        let Some(session) = self.active.as_ref() else {
            return LiveStats::idle(sensor_connected, Some(now));
        };

        let elapsed = elapsed_since(session.recorder.started_at(), now);
        let pulse_count = session.detector.pulse_count();
        let rate = match self.detection.signal_mode {
            SignalMode::RawAnalog => self.rate.estimate(pulse_count, elapsed),
            SignalMode::DecodedRate => RateEstimate {
                bpm: session
                    .recorder
                    .latest_reading()
                    .map(|reading| f64::from(reading.bpm))
                    .unwrap_or(0.0),
                settled: session.recorder.latest_reading().is_some(),
            },
        };

        LiveStats::measuring(LiveInputs {
            pulse_count,
            elapsed,
            rate,
            subject: &session.subject,
            last_reading: session.last_reading,
            sensor_connected,
            now,
        })
    }
}
