// SessionManager: session lifecycle and persistence hand-off
//
// Single Responsibility: serialize the sample path against start/stop and
// hand finalized sessions to the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

use crate::analysis::validator::Sample;
use crate::config::DetectionConfig;
use crate::error::{log_session_error, log_storage_error, SessionError, StorageError};
use crate::managers::BroadcastChannelManager;
use crate::session::{
    Profile, SampleOutcome, SessionController, SessionRecord, SessionSummary,
    StopOutcome,
};
use crate::storage::SessionStore;

/// Result of a successful `stop`.
#[derive(Debug, Clone, PartialEq)]
pub enum StopResult {
    Completed {
        summary: SessionSummary,
        /// False when the store refused the record; the summary is still valid
        persisted: bool,
    },
    NoData,
}

/// Manages the session controller, the registered profile and the store
///
/// The controller mutex is the one boundary around "append event" and
/// "finalize session"; the `measuring` flag mirrors the controller state for
/// readers that must not take that lock.
///
/// # Example
/// ```ignore
/// let manager = SessionManager::new(detection, store);
/// manager.register_profile(profile, today)?;
/// manager.start(None, now)?;
/// manager.on_sample(&sample)?;
/// let result = manager.stop(later)?;
/// ```
pub struct SessionManager {
    controller: Arc<Mutex<SessionController>>,
    measuring: Arc<AtomicBool>,
    profile: Arc<RwLock<Option<Profile>>>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(detection: DetectionConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(SessionController::new(detection))),
            measuring: Arc::new(AtomicBool::new(false)),
            profile: Arc::new(RwLock::new(None)),
            store,
        }
    }

    /// Validate and remember the subject profile used by later starts.
    pub fn register_profile(&self, profile: Profile, today: NaiveDate) -> Result<(), SessionError> {
        profile.validate(today).inspect_err(|err| {
            log_session_error(err, "register_profile");
        })?;

        let mut guard = self.profile.write().map_err(|_| SessionError::StatePoisoned)?;
        log::info!("[SessionManager] Profile registered: {}", profile.display_name());
        *guard = Some(profile);
        Ok(())
    }

    pub fn profile(&self) -> Result<Option<Profile>, SessionError> {
        let guard = self.profile.read().map_err(|_| SessionError::StatePoisoned)?;
        Ok(guard.clone())
    }

    pub fn is_measuring(&self) -> bool {
        self.measuring.load(Ordering::SeqCst)
    }

    /// Start a session with `profile`, or the registered one when `None`.
    ///
    /// A provided profile is registered on success.
    pub fn start(&self, profile: Option<Profile>, now: DateTime<Utc>) -> Result<Profile, SessionError> {
        let provided = profile.is_some();
        let profile = match profile {
            Some(profile) => profile,
            None => self.profile()?.ok_or(SessionError::MissingProfile)?,
        };

        {
            let mut controller = self.lock_controller()?;
            controller
                .start(profile.clone(), now)
                .inspect_err(|err| log_session_error(err, "start_session"))?;
            self.measuring.store(true, Ordering::SeqCst);
        }

        if provided {
            let mut guard = self.profile.write().map_err(|_| SessionError::StatePoisoned)?;
            *guard = Some(profile.clone());
        }
        Ok(profile)
    }

    /// Feed one validated sample through the active session.
    pub fn on_sample(&self, sample: &Sample) -> Result<SampleOutcome, SessionError> {
        if !self.is_measuring() {
            return Ok(SampleOutcome::Ignored);
        }
        let mut controller = self.lock_controller()?;
        Ok(controller.on_sample(sample))
    }

    /// Finalize the session and persist its record.
    ///
    /// Storage failures are logged and reported through `persisted: false`;
    /// they never undo the stop.
    pub fn stop(&self, now: DateTime<Utc>) -> Result<StopResult, SessionError> {
        let outcome = {
            let mut controller = self.lock_controller()?;
            let outcome = controller
                .stop(now)
                .inspect_err(|err| log_session_error(err, "stop_session"))?;
            self.measuring.store(false, Ordering::SeqCst);
            outcome
        };

        match outcome {
            StopOutcome::NoData => Ok(StopResult::NoData),
            StopOutcome::Completed(record) => {
                let persisted = self.persist(&record).is_ok();
                Ok(StopResult::Completed {
                    summary: record.summary,
                    persisted,
                })
            }
        }
    }

    /// Compute and publish the live snapshot while holding the controller
    ///
    /// A snapshot computed before a stop is never published after it.
    pub fn publish_live(
        &self,
        now: DateTime<Utc>,
        sensor_connected: bool,
        broadcasts: &BroadcastChannelManager,
    ) -> Result<(), SessionError> {
        let controller = self.lock_controller()?;
        broadcasts.publish_live(controller.live_stats(now, sensor_connected));
        Ok(())
    }

    pub fn history(&self, day: NaiveDate) -> Result<Vec<SessionRecord>, StorageError> {
        self.store.list_day(day)
    }

    pub fn days(&self) -> Result<Vec<NaiveDate>, StorageError> {
        self.store.days()
    }

    // ========================================================================
    // HELPER METHODS
    // ========================================================================

    fn persist(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.store.append(record).inspect_err(|err| {
            log_storage_error(err, "persist_session");
        })
    }

    fn lock_controller(&self) -> Result<MutexGuard<'_, SessionController>, SessionError> {
        self.controller.lock().map_err(|_| SessionError::StatePoisoned)
    }
}
