// Pulse Monitor - heart-pulse measurement service
// UDP sensor samples → validation → edge detection → live stats and session records

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod managers;
pub mod replay;
pub mod session;
pub mod storage;
pub mod telemetry;

#[cfg(feature = "http")]
pub mod http;

pub use config::AppConfig;
pub use engine::MonitorHandle;

/// Install the global tracing subscriber.
///
/// `log` records from the crate are bridged into tracing. Safe to call more
/// than once; later calls are ignored.
pub fn init_logging(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
