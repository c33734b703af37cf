//! Telemetry event types exposed to the CLI and HTTP surfaces.

use serde::{Deserialize, Serialize};

use crate::analysis::validator::RejectReason;

/// Component an error event originates from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Transport,
    Session,
    Storage,
}

/// Monitor events, tagged for JSON consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    PulseDetected {
        sequence: u64,
        raw_value: i32,
        elapsed_secs: f64,
    },
    SampleRejected {
        reason: RejectReason,
    },
    /// Transport hand-off found the worker queue full
    SampleDropped {
        total_dropped: u64,
    },
    SensorDisconnected {
        silent_for_ms: u64,
    },
    SensorReconnected,
    SessionStarted {
        subject: String,
    },
    SessionStopped {
        total_pulses: usize,
        persisted: bool,
    },
    Error {
        source: ErrorSource,
        code: i32,
        context: String,
    },
}
