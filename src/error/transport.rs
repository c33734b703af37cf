// Transport error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Transport error code constants
///
/// Error code range: 4001-4004
pub struct TransportErrorCodes {}

impl TransportErrorCodes {
    /// Binding the datagram socket failed
    pub const BIND_FAILED: i32 = 4001;

    /// Receiving failed more times in a row than allowed
    pub const RECEIVE_FAILED: i32 = 4002;

    /// Worker channel closed while the source was still running
    pub const CHANNEL_CLOSED: i32 = 4003;

    /// Source already running
    pub const ALREADY_RUNNING: i32 = 4004;
}

/// Log a transport error with structured context
pub fn log_transport_error(err: &TransportError, context: &str) {
    error!(
        "Transport error in {}: code={}, component=UdpSampleSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Resource errors raised by the sample transport.
///
/// A bind failure is fatal at startup. Receive failures are retried with
/// backoff and only surface once the retry budget is spent.
///
/// Error code range: 4001-4004
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Socket could not be bound
    BindFailed { addr: String, reason: String },

    /// Consecutive receive failures exceeded the configured budget
    ReceiveFailed { attempts: u32, reason: String },

    /// The receiving worker is gone
    ChannelClosed,

    /// `start` called twice
    AlreadyRunning,
}

impl ErrorCode for TransportError {
    fn code(&self) -> i32 {
        match self {
            TransportError::BindFailed { .. } => TransportErrorCodes::BIND_FAILED,
            TransportError::ReceiveFailed { .. } => TransportErrorCodes::RECEIVE_FAILED,
            TransportError::ChannelClosed => TransportErrorCodes::CHANNEL_CLOSED,
            TransportError::AlreadyRunning => TransportErrorCodes::ALREADY_RUNNING,
        }
    }

    fn message(&self) -> String {
        match self {
            TransportError::BindFailed { addr, reason } => {
                format!("Failed to bind {}: {}", addr, reason)
            }
            TransportError::ReceiveFailed { attempts, reason } => {
                format!("Receive failed {} times in a row: {}", attempts, reason)
            }
            TransportError::ChannelClosed => "Sample channel closed".to_string(),
            TransportError::AlreadyRunning => "Sample source already running".to_string(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TransportError {}
