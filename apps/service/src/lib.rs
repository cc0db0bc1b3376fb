//! Liveness monitor for dashboard projects.
//!
//! On every scheduler tick the monitor lists the registered projects, probes
//! each project's live URL in its own task and writes the resulting status
//! back to the registry.

pub mod config;
pub mod database;
pub mod error;
pub mod monitoring;
pub mod pool;
pub mod routes;

pub use error::MonitorError;
