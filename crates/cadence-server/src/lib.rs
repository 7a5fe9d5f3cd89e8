//! # cadence-server
//!
//! Axum HTTP surface for the genre classifier.
//!
//! - `POST /predict`: multipart upload in, [`PredictionResult`] JSON out
//! - `GET /health`: liveness plus model registry state
//! - `GET /genres`: the configured label space, in order
//!
//! Failures are rendered as `{"error": {"code", "message"}}` by [`ApiError`].
//!
//! [`PredictionResult`]: cadence_inference::PredictionResult

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ApiError;
pub use server::{AppState, CadenceServer};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
