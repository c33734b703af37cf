//! Deterministic offline replay of a sensor recording.
//!
//! A recording is a text file with one `<offset_ms> <payload>` pair per
//! line, offsets counted from session start. Blank lines and lines starting
//! with `#` are skipped. The replay drives the same `MonitorHandle` sample
//! path as the live transport, on a manual clock and an in-memory store.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::engine::{IngestOutcome, ManualClock, MonitorHandle};
use crate::managers::StopResult;
use crate::session::{Profile, SampleOutcome, SessionSummary};
use crate::storage::MemorySessionStore;
use crate::telemetry::TelemetryCounters;

/// One recorded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSample {
    pub offset_ms: u64,
    pub payload: String,
}

/// Outcome of a replay, printed as JSON by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub samples: usize,
    pub pulses: u64,
    /// `None` when the recording produced no pulses or readings
    pub summary: Option<SessionSummary>,
    pub counters: TelemetryCounters,
}

/// Parse recording text into samples ordered as written.
pub fn parse_recording(text: &str) -> Result<Vec<RecordedSample>> {
    let mut samples = Vec::new();
    let mut previous = 0u64;

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (offset, payload) = line
            .split_once(char::is_whitespace)
            .map(|(offset, payload)| (offset, payload.trim()))
            .unwrap_or((line, ""));
        let offset_ms: u64 = offset
            .parse()
            .with_context(|| format!("line {}: invalid offset {:?}", index + 1, offset))?;
        if offset_ms < previous {
            bail!(
                "line {}: offset {} goes backwards (previous {})",
                index + 1,
                offset_ms,
                previous
            );
        }
        previous = offset_ms;
        samples.push(RecordedSample {
            offset_ms,
            payload: payload.to_string(),
        });
    }
    Ok(samples)
}

/// Run `samples` through a fresh monitor as one session starting at `start`.
///
/// The session stops at the last sample's offset.
pub fn replay(
    config: AppConfig,
    profile: Profile,
    samples: &[RecordedSample],
    start: DateTime<Utc>,
) -> Result<ReplayReport> {
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(MemorySessionStore::new());
    let handle = MonitorHandle::with_parts(config, clock.clone(), store);

    handle
        .start_session(Some(profile))
        .context("starting replay session")?;

    let mut pulses = 0u64;
    for sample in samples {
        clock.set(start);
        clock.advance(Duration::from_millis(sample.offset_ms));
        let outcome = handle
            .ingest(&sample.payload, None)
            .with_context(|| format!("ingesting sample at {} ms", sample.offset_ms))?;
        if let IngestOutcome::Accepted(SampleOutcome::Pulse(_)) = outcome {
            pulses += 1;
        }
    }

    let summary = match handle
        .stop_session()
        .context("stopping replay session")?
    {
        StopResult::Completed { summary, .. } => Some(summary),
        StopResult::NoData => None,
    };

    Ok(ReplayReport {
        samples: samples.len(),
        pulses,
        summary,
        counters: handle.telemetry().counters(),
    })
}

/// Load a recording and a profile JSON file and replay them.
pub fn replay_files(
    config: AppConfig,
    recording: &Path,
    profile: &Path,
    start: DateTime<Utc>,
) -> Result<ReplayReport> {
    let text = fs::read_to_string(recording)
        .with_context(|| format!("reading recording {}", recording.display()))?;
    let samples = parse_recording(&text)
        .with_context(|| format!("parsing recording {}", recording.display()))?;
    let profile = load_profile(profile)?;
    replay(config, profile, &samples, start)
}

pub fn load_profile(path: &Path) -> Result<Profile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading profile {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing profile {}", path.display()))
}
