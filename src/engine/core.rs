//! MonitorHandle: owned orchestration layer of the pulse monitor.
//!
//! One handle is created per process and shared (`Arc`) between the worker
//! draining the sample source and the control surfaces (HTTP, CLI). It owns
//! every piece of mutable state; nothing is global.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{broadcast, mpsc, watch};

use crate::analysis::validator::{RejectReason, SignalValidator, Validation};
use crate::config::AppConfig;
use crate::engine::backend::{Clock, InboundMessage, SampleSource, SourceContext, SystemClock};
use crate::error::{log_transport_error, SessionError, StorageError, TransportError};
use crate::managers::{BroadcastChannelManager, SessionManager, StopResult};
use crate::session::{local_day, LiveStats, Profile, PulseEvent, SampleOutcome, SessionRecord};
use crate::storage::{JsonlSessionStore, SessionStore};
use crate::telemetry::{ErrorSource, TelemetryHub};

#[path = "worker.rs"]
mod worker;

/// What happened to one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Rejected(RejectReason),
    Accepted(SampleOutcome),
}

/// MonitorHandle orchestrates the sample path, sessions and shared channels.
pub struct MonitorHandle {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    validator: SignalValidator,
    sessions: SessionManager,
    pub(crate) broadcasts: BroadcastChannelManager,
    telemetry: Arc<TelemetryHub>,
    sensor_connected: AtomicBool,
    shutting_down: AtomicBool,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl MonitorHandle {
    /// Create a handle with the system clock and the configured JSON-lines store.
    pub fn new(config: AppConfig) -> Result<Self, StorageError> {
        let store = JsonlSessionStore::open(&config.storage.directory)?;
        Ok(Self::with_parts(
            config,
            Arc::new(SystemClock::default()),
            Arc::new(store),
        ))
    }

    /// Create a handle from explicit collaborators.
    pub fn with_parts(config: AppConfig, clock: Arc<dyn Clock>, store: Arc<dyn SessionStore>) -> Self {
        let validator = SignalValidator::from_config(&config.detection);
        let sessions = SessionManager::new(config.detection.clone(), store);
        let (shutdown_tx, _) = watch::channel(false);

        log::info!(
            "[MonitorHandle] Created ({:?} mode, threshold {}, accepted range {:?})",
            config.detection.signal_mode,
            config.detection.threshold,
            validator.range()
        );

        Self {
            config,
            clock,
            validator,
            sessions,
            broadcasts: BroadcastChannelManager::new(),
            telemetry: Arc::new(TelemetryHub::default()),
            sensor_connected: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn telemetry(&self) -> &TelemetryHub {
        &self.telemetry
    }

    pub fn is_measuring(&self) -> bool {
        self.sessions.is_measuring()
    }

    pub fn sensor_connected(&self) -> bool {
        self.sensor_connected.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    // ========================================================================
    // CONTROL SURFACE
    // ========================================================================

    pub fn register_profile(&self, profile: Profile) -> Result<(), SessionError> {
        self.sessions
            .register_profile(profile, local_day(self.clock.now()))
    }

    pub fn profile(&self) -> Result<Option<Profile>, SessionError> {
        self.sessions.profile()
    }

    /// Start measuring with `profile`, or the registered profile.
    pub fn start_session(&self, profile: Option<Profile>) -> Result<Profile, SessionError> {
        if self.is_shutting_down() {
            return Err(SessionError::ShuttingDown);
        }
        let started = self
            .sessions
            .start(profile, self.clock.now())
            .inspect_err(|err| self.telemetry.record_error(ErrorSource::Session, err, "start_session"))?;

        self.telemetry.record_session_started(started.display_name());
        self.refresh_live();
        Ok(started)
    }

    /// Stop measuring; the record is persisted before this returns.
    pub fn stop_session(&self) -> Result<StopResult, SessionError> {
        let result = self
            .sessions
            .stop(self.clock.now())
            .inspect_err(|err| self.telemetry.record_error(ErrorSource::Session, err, "stop_session"))?;

        match &result {
            StopResult::Completed { summary, persisted } => {
                self.telemetry
                    .record_session_stopped(summary.total_pulses, *persisted);
            }
            StopResult::NoData => self.telemetry.record_session_stopped(0, false),
        }
        self.refresh_live();
        Ok(result)
    }

    /// Latest published snapshot.
    pub fn live_stats(&self) -> LiveStats {
        self.broadcasts.live()
    }

    pub fn subscribe_live(&self) -> watch::Receiver<LiveStats> {
        self.broadcasts.subscribe_live()
    }

    pub fn subscribe_pulses(&self) -> broadcast::Receiver<PulseEvent> {
        self.broadcasts.subscribe_pulses()
    }

    pub fn history(&self, day: NaiveDate) -> Result<Vec<SessionRecord>, StorageError> {
        self.sessions
            .history(day)
            .inspect_err(|err| self.telemetry.record_error(ErrorSource::Storage, err, "history"))
    }

    pub fn days(&self) -> Result<Vec<NaiveDate>, StorageError> {
        self.sessions
            .days()
            .inspect_err(|err| self.telemetry.record_error(ErrorSource::Storage, err, "days"))
    }

    /// Finalize any active session, then release the transport.
    ///
    /// Idempotent; later calls return `None`.
    pub fn shutdown(&self) -> Option<StopResult> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return None;
        }
        log::info!("[MonitorHandle] Shutdown requested");

        let finalized = if self.is_measuring() {
            match self.stop_session() {
                Ok(result) => Some(result),
                Err(err) => {
                    log::error!("[MonitorHandle] Failed to finalize session on shutdown: {}", err);
                    None
                }
            }
        } else {
            None
        };

        self.shutdown_tx.send_replace(true);
        finalized
    }

    /// Receiver that flips to `true` once shutdown has been requested.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    // ========================================================================
    // SAMPLE PATH
    // ========================================================================

    /// Ingest a payload stamped with the handle's clock.
    pub fn ingest(&self, payload: &str, source: Option<SocketAddr>) -> Result<IngestOutcome, SessionError> {
        self.ingest_at(payload, source, self.clock.now())
    }

    /// Validate, detect and record one payload.
    pub fn ingest_at(
        &self,
        payload: &str,
        source: Option<SocketAddr>,
        at: DateTime<Utc>,
    ) -> Result<IngestOutcome, SessionError> {
        let sample = match self.validator.validate(payload, at, source) {
            Validation::Accepted(sample) => sample,
            Validation::Rejected(reason) => {
                log::debug!("[MonitorHandle] Sample rejected: {}", reason);
                self.telemetry.record_rejected(&reason);
                return Ok(IngestOutcome::Rejected(reason));
            }
        };
        self.telemetry.record_accepted();

        let outcome = self.sessions.on_sample(&sample)?;
        match &outcome {
            SampleOutcome::Pulse(event) => {
                self.telemetry.record_pulse(event);
                self.broadcasts.publish_pulse(event.clone());
                self.refresh_live_at(at);
            }
            SampleOutcome::Reading(_) => self.refresh_live_at(at),
            SampleOutcome::Ignored | SampleOutcome::NoPulse => {}
        }
        Ok(IngestOutcome::Accepted(outcome))
    }

    /// Apply one message from the sample source.
    pub fn handle_message(&self, message: InboundMessage) {
        match message {
            InboundMessage::Datagram(datagram) => {
                if let Err(err) =
                    self.ingest_at(&datagram.payload, datagram.source, datagram.received_at)
                {
                    log::error!("[MonitorHandle] Sample path failed: {}", err);
                    self.telemetry
                        .record_error(ErrorSource::Session, &err, "ingest");
                }
            }
            InboundMessage::Connected { after_silence } => {
                self.sensor_connected.store(true, Ordering::SeqCst);
                if after_silence {
                    self.telemetry.record_reconnected();
                }
                self.refresh_live();
            }
            InboundMessage::Disconnected { silent_for } => {
                self.on_disconnected(silent_for);
            }
            InboundMessage::SourceFailed(err) => {
                log_transport_error(&err, "sample_source");
                self.telemetry
                    .record_error(ErrorSource::Transport, &err, "sample_source");
                self.sensor_connected.store(false, Ordering::SeqCst);
                self.refresh_live();
            }
        }
    }

    fn on_disconnected(&self, silent_for: Duration) {
        self.sensor_connected.store(false, Ordering::SeqCst);
        self.telemetry
            .record_disconnected(silent_for.as_millis() as u64);

        if self.is_measuring() && self.config.transport.auto_stop_on_disconnect {
            log::warn!("[MonitorHandle] Sensor silent, stopping active session");
            if let Err(err) = self.stop_session() {
                log::error!("[MonitorHandle] Auto-stop failed: {}", err);
            }
        } else {
            if self.is_measuring() {
                log::warn!("[MonitorHandle] Sensor silent, session continues with stale live stats");
            }
            self.refresh_live();
        }
    }

    /// Recompute and publish the live snapshot at the current clock time.
    pub fn refresh_live(&self) {
        self.refresh_live_at(self.clock.now());
    }

    fn refresh_live_at(&self, now: DateTime<Utc>) {
        if let Err(err) = self
            .sessions
            .publish_live(now, self.sensor_connected(), &self.broadcasts)
        {
            log::error!("[MonitorHandle] Live stats unavailable: {}", err);
        }
    }

    // ========================================================================
    // RUN LOOP
    // ========================================================================

    /// Run `source` and the worker until shutdown or until the source ends.
    ///
    /// Returns the source's own error, if it gave up.
    pub async fn run(self: &Arc<Self>, source: Box<dyn SampleSource>) -> Result<(), TransportError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransportError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(self.config.transport.channel_capacity.max(1));
        log::info!("[MonitorHandle] Starting source {}", source.describe());
        let source_task = source.spawn(SourceContext {
            tx,
            shutdown: self.shutdown_signal(),
            clock: Arc::clone(&self.clock),
            telemetry: Arc::clone(&self.telemetry),
        });

        let refresh = Duration::from_millis(self.config.live.refresh_interval_ms.max(1));
        worker::run_worker(Arc::clone(self), rx, self.shutdown_signal(), refresh).await;

        let result = match source_task.await {
            Ok(result) => result,
            Err(join_err) => {
                log::error!("[MonitorHandle] Source task aborted: {}", join_err);
                Err(TransportError::ChannelClosed)
            }
        };
        self.running.store(false, Ordering::SeqCst);
        result
    }
}
