//! Worker loop draining the sample source into the monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use super::MonitorHandle;
use crate::engine::backend::InboundMessage;

/// Consume source messages and refresh the elapsed-time display between
/// pulses. Ends on shutdown or when every sender is gone.
pub(super) async fn run_worker(
    handle: Arc<MonitorHandle>,
    mut rx: mpsc::Receiver<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
    refresh: Duration,
) {
    let span = tracing::info_span!("monitor_worker");
    async move {
        let mut ticker = tokio::time::interval(refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut handled: u64 = 0;

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                message = rx.recv() => match message {
                    Some(message) => {
                        handle.handle_message(message);
                        handled += 1;
                    }
                    None => {
                        log::info!("[Worker] Source closed");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if handle.is_measuring() {
                        handle.refresh_live();
                    }
                }
            }
        }

        log::info!("[Worker] Stopped after {} messages", handled);
    }
    .instrument(span)
    .await
}
