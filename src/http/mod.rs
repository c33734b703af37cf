//! HTTP control surface, built with the `http` feature.
//!
//! A thin Axum layer over `MonitorHandle`: every command answers with a
//! `CommandResult { success, message, data }`, and pulses stream over SSE.

mod routes;
mod sse;

pub use routes::{build_router, run_http_server, CommandResult, HttpServerError, HttpState};
