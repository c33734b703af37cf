// BroadcastChannelManager: live snapshot and pulse stream channels
// Single Responsibility: channel lifecycle and subscription

use tokio::sync::{broadcast, watch};

use crate::session::{LiveStats, PulseEvent};

/// Pulse stream buffer; slow SSE readers lag past this.
const PULSE_CHANNEL_CAPACITY: usize = 256;

/// Manages the channels readers use to follow a running monitor
///
/// # Channel Types
/// - Live stats: a `watch` channel holding the latest whole snapshot, so a
///   reader always sees one complete `LiveStats` and never a mix of two
/// - Pulses: a broadcast of every detected `PulseEvent`
pub struct BroadcastChannelManager {
    live: watch::Sender<LiveStats>,
    pulses: broadcast::Sender<PulseEvent>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        let (live, _) = watch::channel(LiveStats::default());
        let (pulses, _) = broadcast::channel(PULSE_CHANNEL_CAPACITY);
        Self { live, pulses }
    }

    // ========================================================================
    // LIVE STATS
    // ========================================================================

    /// Replace the published snapshot
    ///
    /// Stored even when nobody is subscribed.
    pub fn publish_live(&self, stats: LiveStats) {
        self.live.send_replace(stats);
    }

    /// Latest published snapshot
    pub fn live(&self) -> LiveStats {
        self.live.borrow().clone()
    }

    pub fn subscribe_live(&self) -> watch::Receiver<LiveStats> {
        self.live.subscribe()
    }

    // ========================================================================
    // PULSES
    // ========================================================================

    /// Broadcast a detected pulse; a send with no subscribers is not an error
    pub fn publish_pulse(&self, event: PulseEvent) {
        let _ = self.pulses.send(event);
    }

    pub fn subscribe_pulses(&self) -> broadcast::Receiver<PulseEvent> {
        self.pulses.subscribe()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
