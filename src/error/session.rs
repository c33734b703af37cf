// Session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Session error code constants
///
/// Single source of truth for the codes reported through the control
/// surface when a session command is refused.
///
/// Error code range: 3001-3006
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// A session is already being measured
    pub const ALREADY_MEASURING: i32 = 3001;

    /// No session is being measured
    pub const NOT_MEASURING: i32 = 3002;

    /// Subject profile is missing a required field
    pub const INVALID_PROFILE: i32 = 3003;

    /// No subject profile has been registered
    pub const MISSING_PROFILE: i32 = 3004;

    /// Session state mutex was poisoned
    pub const STATE_POISONED: i32 = 3005;

    /// The monitor is shutting down and refuses new sessions
    pub const SHUTTING_DOWN: i32 = 3006;
}

/// Log a session error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SessionController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session lifecycle errors
///
/// These cover commands that are invalid in the current controller state
/// and profile validation failures. None of them are fatal.
///
/// Error code range: 3001-3006
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// `start` issued while a session is active
    AlreadyMeasuring,

    /// `stop` issued while idle
    NotMeasuring,

    /// Profile failed validation
    InvalidProfile { field: &'static str, reason: String },

    /// `start` issued without any profile
    MissingProfile,

    /// Session state mutex was poisoned
    StatePoisoned,

    /// Monitor is shutting down
    ShuttingDown,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::AlreadyMeasuring => SessionErrorCodes::ALREADY_MEASURING,
            SessionError::NotMeasuring => SessionErrorCodes::NOT_MEASURING,
            SessionError::InvalidProfile { .. } => SessionErrorCodes::INVALID_PROFILE,
            SessionError::MissingProfile => SessionErrorCodes::MISSING_PROFILE,
            SessionError::StatePoisoned => SessionErrorCodes::STATE_POISONED,
            SessionError::ShuttingDown => SessionErrorCodes::SHUTTING_DOWN,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::AlreadyMeasuring => {
                "Session already in progress. Call stop_session() first.".to_string()
            }
            SessionError::NotMeasuring => {
                "No session in progress. Call start_session() first.".to_string()
            }
            SessionError::InvalidProfile { field, reason } => {
                format!("Invalid profile field '{}': {}", field, reason)
            }
            SessionError::MissingProfile => "Subject profile required".to_string(),
            SessionError::StatePoisoned => "Session state lock poisoned".to_string(),
            SessionError::ShuttingDown => "Monitor is shutting down".to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}
