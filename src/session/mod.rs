// Session module - lifecycle, recording and live/summary derivations

pub mod controller;
pub mod live;
pub mod profile;
pub mod recorder;
pub mod summary;

pub use controller::{ControllerState, SampleOutcome, SessionController, StopOutcome};
pub use live::{format_elapsed, LiveStats};
pub use profile::{Profile, Sex, SubjectMetrics};
pub use recorder::{elapsed_since, local_day, PulseEvent, RateReading, SessionRecorder};
pub use summary::{ReportedRate, SessionRecord, SessionSummary};
