//! Listener configuration derived from settings.

use std::time::Duration;

use cadence_settings::ServerSettings;

/// Runtime configuration for [`CadenceServer`](crate::CadenceServer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Request body ceiling in bytes.
    pub max_upload_bytes: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// Copy the transport fields out of loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_upload_bytes: settings.max_upload_bytes,
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
        }
    }

    /// `host:port`, ready for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}
