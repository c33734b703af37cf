//! Engine module housing the monitor core.
//!
//! `backend` holds the sample source abstraction (UDP, scripted) and clocks;
//! `core` holds the `MonitorHandle` shared by the worker and control surfaces.

pub mod backend;
pub mod core;

pub use backend::{
    Clock, InboundDatagram, InboundMessage, ManualClock, SampleSource, ScriptedSource,
    SourceContext, SystemClock, UdpSampleSource,
};
pub use core::{IngestOutcome, MonitorHandle};
