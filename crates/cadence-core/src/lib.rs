//! # cadence-core
//!
//! Foundation pieces shared by every Cadence crate:
//!
//! - [`logging::init_subscriber`] installs the process-wide `tracing` subscriber
//! - [`logging::capture_logs`] records events in memory for test assertions

#![deny(unsafe_code)]

pub mod logging;
