//! Structured logging with `tracing`.
//!
//! The service and the dataset tools both log through `tracing` macros with
//! structured fields. The binary installs one stderr subscriber at startup
//! via [`init_subscriber`]; tests install a thread-local capturing layer via
//! [`capture_logs`].

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Fallback level when neither `RUST_LOG` nor settings provide one.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize the global tracing subscriber with compact stderr output.
///
/// `RUST_LOG` takes precedence over `level` when set. Subsequent calls are
/// no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let level = if level.trim().is_empty() {
        DEFAULT_LEVEL
    } else {
        level
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already set
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_is_idempotent() {
        init_subscriber("debug");
        init_subscriber("warn");
        tracing::info!("still logging after double init");
    }

    #[test]
    fn blank_level_falls_back() {
        init_subscriber("  ");
    }
}
