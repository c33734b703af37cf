// Analysis module - signal gate, pulse detection and cardiac metrics
//
// Everything here is synchronous and free of shared state; the session
// controller owns the stateful pieces and the engine drives them.
//
// Pipeline:
// - SignalValidator: payload → Sample | Rejected
// - EdgeDetector: Sample → pulse (strict rising edge)
// - RateEstimator / zones / energy: live metrics
// - statistics: finalized events → SessionStatistics

pub mod edge;
pub mod energy;
pub mod rate;
pub mod statistics;
pub mod validator;
pub mod zones;

pub use edge::{EdgeDetector, EdgeResult};
pub use energy::Biometrics;
pub use rate::{instantaneous_rate, RateEstimate, RateEstimator};
pub use statistics::{aggregate, SessionStatistics};
pub use validator::{RejectReason, Sample, SignalValidator, Validation};
pub use zones::Zone;
