//! Monitor telemetry collector and hub.
//!
//! The collector keeps a bounded history of [`MetricEvent`]s plus a
//! broadcast stream. The hub is owned by the `MonitorHandle` and adds the
//! counters surfaced through `/api/stats` and the CLI.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::validator::RejectReason;
use crate::error::ErrorCode;
use crate::session::PulseEvent;

pub mod events;

pub use events::{ErrorSource, MetricEvent};

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub counters: TelemetryCounters,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub samples_accepted: u64,
    pub samples_rejected: u64,
    pub samples_dropped: u64,
    pub pulses_detected: u64,
    pub disconnects: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            let mut history = self.lock_history();
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    fn recent(&self) -> Vec<MetricEvent> {
        self.lock_history().iter().cloned().collect()
    }

    // History is append/pop only, so a poisoned guard is still consistent.
    fn lock_history(&self) -> MutexGuard<'_, VecDeque<MetricEvent>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Top-level hub wrapping the collector plus monitor counters.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    samples_accepted: AtomicU64,
    samples_rejected: AtomicU64,
    samples_dropped: AtomicU64,
    pulses_detected: AtomicU64,
    disconnects: AtomicU64,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            samples_accepted: AtomicU64::new(0),
            samples_rejected: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            pulses_detected: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.collector.subscribe()
    }

    pub fn counters(&self) -> TelemetryCounters {
        TelemetryCounters {
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            pulses_detected: self.pulses_detected.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            recent: self.collector.recent(),
            total_events: self.collector.total_events.load(Ordering::Relaxed),
            dropped_events: self.collector.dropped_history.load(Ordering::Relaxed),
            counters: self.counters(),
        }
    }

    pub fn record_accepted(&self) {
        self.samples_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pulse(&self, event: &PulseEvent) {
        self.pulses_detected.fetch_add(1, Ordering::Relaxed);
        self.collector.publish(MetricEvent::PulseDetected {
            sequence: event.sequence,
            raw_value: event.raw_value,
            elapsed_secs: event.elapsed_secs,
        });
    }

    pub fn record_rejected(&self, reason: &RejectReason) {
        self.samples_rejected.fetch_add(1, Ordering::Relaxed);
        self.collector.publish(MetricEvent::SampleRejected {
            reason: reason.clone(),
        });
    }

    pub fn record_dropped(&self) {
        let total_dropped = self.samples_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        // Published on powers of two only.
        if total_dropped.is_power_of_two() {
            self.collector
                .publish(MetricEvent::SampleDropped { total_dropped });
        }
    }

    pub fn record_disconnected(&self, silent_for_ms: u64) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        self.collector
            .publish(MetricEvent::SensorDisconnected { silent_for_ms });
    }

    pub fn record_reconnected(&self) {
        self.collector.publish(MetricEvent::SensorReconnected);
    }

    pub fn record_session_started(&self, subject: impl Into<String>) {
        self.collector.publish(MetricEvent::SessionStarted {
            subject: subject.into(),
        });
    }

    pub fn record_session_stopped(&self, total_pulses: usize, persisted: bool) {
        self.collector.publish(MetricEvent::SessionStopped {
            total_pulses,
            persisted,
        });
    }

    pub fn record_error<E: ErrorCode>(&self, source: ErrorSource, err: &E, context: &str) {
        self.collector.publish(MetricEvent::Error {
            source,
            code: err.code(),
            context: format!("{}: {}", context, err.message()),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use chrono::Utc;

    fn pulse(sequence: u64) -> PulseEvent {
        PulseEvent {
            sequence,
            timestamp: Utc::now(),
            raw_value: 2500,
            elapsed_secs: sequence as f64,
        }
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::SensorReconnected);
        collector.publish(MetricEvent::SensorDisconnected { silent_for_ms: 10 });
        collector.publish(MetricEvent::SessionStarted {
            subject: "A".into(),
        });

        let recent = collector.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0], MetricEvent::SensorReconnected);
        assert!(matches!(recent[2], MetricEvent::SessionStarted { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let hub = TelemetryHub::new(8, 2);
        hub.record_pulse(&pulse(1));
        hub.record_pulse(&pulse(2));
        hub.record_pulse(&pulse(3));

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.counters.pulses_detected, 3);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::PulseDetected { sequence: 2, .. }
        ));
    }

    #[test]
    fn rejections_and_drops_are_counted() {
        let hub = TelemetryHub::default();
        hub.record_rejected(&RejectReason::Empty);
        for _ in 0..5 {
            hub.record_dropped();
        }
        let counters = hub.counters();
        assert_eq!(counters.samples_rejected, 1);
        assert_eq!(counters.samples_dropped, 5);

        // drop events at 1, 2 and 4
        let drops = hub
            .snapshot()
            .recent
            .iter()
            .filter(|e| matches!(e, MetricEvent::SampleDropped { .. }))
            .count();
        assert_eq!(drops, 3);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let hub = TelemetryHub::default();
        let mut rx = hub.subscribe();
        hub.record_error(ErrorSource::Session, &SessionError::NotMeasuring, "stop");
        match rx.recv().await.unwrap() {
            MetricEvent::Error { code, source, .. } => {
                assert_eq!(code, 3002);
                assert_eq!(source, ErrorSource::Session);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_value(MetricEvent::SensorDisconnected { silent_for_ms: 10_000 })
            .unwrap();
        assert_eq!(json["type"], "sensor_disconnected");
        assert_eq!(json["payload"]["silent_for_ms"], 10_000);
    }
}
