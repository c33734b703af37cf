//! Configuration management for the pulse monitor
//!
//! Runtime configuration is loaded from a JSON file so detection thresholds,
//! transport timeouts and storage location can be tuned per sensor without
//! recompilation. Missing or invalid files fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// Environment variable overriding the default config path
pub const CONFIG_ENV_VAR: &str = "PULSE_MONITOR_CONFIG";

/// Default config path used when neither CLI nor environment provide one
pub const DEFAULT_CONFIG_PATH: &str = "config/pulse_monitor.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

/// What the sensor puts on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    /// Raw ADC readings; pulses come from rising-edge detection
    RawAnalog,
    /// The device already decoded a rate; each reading is a BPM value
    DecodedRate,
}

/// Pulse detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub signal_mode: SignalMode,
    /// Rising-edge threshold on the raw signal
    pub threshold: i32,
    /// Inclusive lower bound of a raw ADC reading
    pub raw_min: i32,
    /// Inclusive upper bound of a raw ADC reading (12-bit ADC)
    pub raw_max: i32,
    /// Inclusive lower bound of a decoded rate reading
    pub rate_min: i32,
    /// Inclusive upper bound of a decoded rate reading
    pub rate_max: i32,
    /// Elapsed seconds after which the cumulative rate is considered settled
    pub settle_secs: u64,
}

impl DetectionConfig {
    /// Inclusive accepted range for the configured signal mode
    pub fn accepted_range(&self) -> RangeInclusive<i32> {
        match self.signal_mode {
            SignalMode::RawAnalog => self.raw_min..=self.raw_max,
            SignalMode::DecodedRate => self.rate_min..=self.rate_max,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            signal_mode: SignalMode::RawAnalog,
            threshold: 2000,
            raw_min: 0,
            raw_max: 4095,
            rate_min: 20,
            rate_max: 220,
            settle_secs: 30,
        }
    }
}

/// Datagram transport parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub bind_addr: String,
    /// Upper bound on a single receive call
    pub recv_timeout_ms: u64,
    /// Silence after which the sensor is reported as disconnected
    pub quiet_period_secs: u64,
    pub max_datagram_bytes: usize,
    /// Capacity of the transport → worker channel
    pub channel_capacity: usize,
    /// Receive failures in a row tolerated before the source gives up
    pub max_consecutive_failures: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Finalize the active session when the sensor goes quiet
    pub auto_stop_on_disconnect: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3333".to_string(),
            recv_timeout_ms: 1000,
            quiet_period_secs: 10,
            max_datagram_bytes: 64,
            channel_capacity: 1024,
            max_consecutive_failures: 10,
            backoff_initial_ms: 100,
            backoff_max_ms: 5000,
            auto_stop_on_disconnect: false,
        }
    }
}

/// Session record storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON-lines file per calendar day
    pub directory: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: "sessions".to_string(),
        }
    }
}

/// Control surface HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Live stats publishing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Period of the elapsed-time refresh between pulses
    pub refresh_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the env override or the default path
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from_file(path)
    }
}
