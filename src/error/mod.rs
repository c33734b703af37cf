// Error types for the pulse monitor
//
// Each concern gets its own enum with stable numeric codes so that the
// control surface can report failures as structured results instead of raw
// internal faults.

mod session;
mod storage;
mod transport;

pub use session::{log_session_error, SessionError, SessionErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};
pub use transport::{log_transport_error, TransportError, TransportErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the control surface.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
