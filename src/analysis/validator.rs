//! SignalValidator - the single gate between transport payloads and detection
//!
//! Accepted payload forms:
//! - a bare integer (`"2517"`)
//! - a small JSON object with a numeric field (`{"value": 2517}`, `{"bpm": 72}`)
//! - whitespace-separated integer columns; the last column is the reading
//!
//! Anything else is rejected without touching detector state.

use std::net::SocketAddr;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;

/// JSON keys checked, in order, for the reading.
const JSON_VALUE_KEYS: [&str; 4] = ["value", "raw", "bpm", "signal"];

/// A validated reading, ephemeral: consumed by the sample path and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: i32,
    pub received_at: DateTime<Utc>,
    pub source: Option<SocketAddr>,
}

/// Why a payload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    Empty,
    NotNumeric { payload: String },
    OutOfRange { value: i64, min: i32, max: i32 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "empty payload"),
            RejectReason::NotNumeric { payload } => write!(f, "not numeric: {:?}", payload),
            RejectReason::OutOfRange { value, min, max } => {
                write!(f, "{} outside [{}, {}]", value, min, max)
            }
        }
    }
}

/// Outcome of validating one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Accepted(Sample),
    Rejected(RejectReason),
}

/// Stateless range/format gate for inbound payloads.
#[derive(Debug, Clone)]
pub struct SignalValidator {
    range: RangeInclusive<i32>,
}

impl SignalValidator {
    pub fn new(range: RangeInclusive<i32>) -> Self {
        Self { range }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.accepted_range())
    }

    pub fn range(&self) -> &RangeInclusive<i32> {
        &self.range
    }

    /// Classify a payload as a [`Sample`] or a rejection.
    pub fn validate(
        &self,
        payload: &str,
        received_at: DateTime<Utc>,
        source: Option<SocketAddr>,
    ) -> Validation {
        match self.check(payload) {
            Ok(value) => Validation::Accepted(Sample {
                value,
                received_at,
                source,
            }),
            Err(reason) => Validation::Rejected(reason),
        }
    }

    /// Parse and range-check a payload, returning the reading.
    pub fn check(&self, payload: &str) -> Result<i32, RejectReason> {
        let reading = parse_reading(payload)?;
        let (min, max) = (*self.range.start(), *self.range.end());
        if reading < i64::from(min) || reading > i64::from(max) {
            return Err(RejectReason::OutOfRange {
                value: reading,
                min,
                max,
            });
        }
        // In range of an i32 range, so the narrowing is lossless.
        Ok(reading as i32)
    }
}

/// Extract the integer reading from a payload without range checks.
pub fn parse_reading(payload: &str) -> Result<i64, RejectReason> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(RejectReason::Empty);
    }

    let not_numeric = || RejectReason::NotNumeric {
        payload: trimmed.chars().take(32).collect(),
    };

    if trimmed.starts_with('{') {
        return parse_json_reading(trimmed).ok_or_else(not_numeric);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }

    // Every column must be an integer, or the whole line is refused.
    let columns: Option<Vec<i64>> = trimmed
        .split_whitespace()
        .map(|column| column.parse::<i64>().ok())
        .collect();
    columns
        .and_then(|columns| columns.last().copied())
        .ok_or_else(not_numeric)
}

fn parse_json_reading(payload: &str) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let object = value.as_object()?;

    let keyed = JSON_VALUE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(json_integer));
    if keyed.is_some() {
        return keyed;
    }

    // Fall back to the only numeric field, if there is exactly one.
    let mut numeric = object.values().filter_map(json_integer);
    match (numeric.next(), numeric.next()) {
        (Some(value), None) => Some(value),
        _ => None,
    }
}

fn json_integer(value: &serde_json::Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    let float = value.as_f64()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}
