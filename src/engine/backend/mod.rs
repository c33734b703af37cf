//! Sample source abstractions for the monitor engine.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::telemetry::TelemetryHub;

mod scripted;
mod udp;

pub use scripted::ScriptedSource;
pub use udp::UdpSampleSource;

/// One raw payload as it came off the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundDatagram {
    pub payload: String,
    pub source: Option<SocketAddr>,
    pub received_at: DateTime<Utc>,
}

/// Messages a source hands to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Datagram(InboundDatagram),
    /// First datagram, or the first one after a reported silence
    Connected { after_silence: bool },
    /// Nothing received for the configured quiet period
    Disconnected { silent_for: Duration },
    /// The source gave up; it stops right after sending this
    SourceFailed(TransportError),
}

/// Context provided to a sample source when the engine starts it.
pub struct SourceContext {
    pub tx: mpsc::Sender<InboundMessage>,
    pub shutdown: watch::Receiver<bool>,
    pub clock: Arc<dyn Clock>,
    pub telemetry: Arc<TelemetryHub>,
}

impl SourceContext {
    /// Non-blocking hand-off of a datagram; a full queue drops it.
    ///
    /// Returns `Err` only when the worker is gone.
    pub fn forward(&self, datagram: InboundDatagram) -> Result<(), TransportError> {
        match self.tx.try_send(InboundMessage::Datagram(datagram)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.telemetry.record_dropped();
                log::warn!("[SampleSource] Worker queue full, datagram dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::ChannelClosed),
        }
    }

    /// Deliver a control message; these are rare and must not be dropped.
    pub async fn notify(&self, message: InboundMessage) -> Result<(), TransportError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Trait implemented by sample transports.
///
/// A source owns its receive loop; the engine spawns it and consumes its
/// messages until the channel closes or shutdown is signalled.
pub trait SampleSource: Send {
    fn describe(&self) -> String;
    fn spawn(self: Box<Self>, ctx: SourceContext) -> JoinHandle<Result<(), TransportError>>;
}

/// Wall-clock source for sample and session timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock backed by `Utc::now`.
#[derive(Default)]
pub struct SystemClock {
    _unit: (),
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to, for replays and tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
