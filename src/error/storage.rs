// Storage error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Storage error code constants
///
/// Error code range: 5001-5003
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    /// Filesystem operation failed
    pub const IO: i32 = 5001;

    /// Record could not be encoded or decoded
    pub const SERIALIZATION: i32 = 5002;

    /// Store lock was poisoned
    pub const LOCK_POISONED: i32 = 5003;
}

/// Log a storage error with structured context
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=SessionStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the session store.
///
/// Error code range: 5001-5003
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Filesystem operation failed
    Io { path: String, reason: String },

    /// Record could not be encoded or decoded
    Serialization { reason: String },

    /// Store lock was poisoned
    LockPoisoned,
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Io { .. } => StorageErrorCodes::IO,
            StorageError::Serialization { .. } => StorageErrorCodes::SERIALIZATION,
            StorageError::LockPoisoned => StorageErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Io { path, reason } => format!("I/O error on {}: {}", path, reason),
            StorageError::Serialization { reason } => {
                format!("Record serialization failed: {}", reason)
            }
            StorageError::LockPoisoned => "Session store lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_codes() {
        assert_eq!(
            StorageError::Io {
                path: "x".to_string(),
                reason: "y".to_string()
            }
            .code(),
            StorageErrorCodes::IO
        );
        assert_eq!(
            StorageError::Serialization {
                reason: "bad".to_string()
            }
            .code(),
            StorageErrorCodes::SERIALIZATION
        );
        assert_eq!(
            StorageError::LockPoisoned.code(),
            StorageErrorCodes::LOCK_POISONED
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: StorageError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }
}
