//! `/health` endpoint.

use std::time::Instant;

use cadence_inference::{ComputeDevice, ModelRegistry, RegistryState};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Model registry state.
    pub models: RegistryState,
    /// Where the extractor runs, once loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<ComputeDevice>,
    /// Startup failure message, when `models` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot the registry into a health response.
pub fn health_check(start_time: Instant, registry: &ModelRegistry) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        models: registry.state(),
        device: registry.bundle().ok().map(|b| b.device()),
        error: registry.failure().map(str::to_string),
    }
}
