//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a partial JSON file only needs the keys it overrides.

mod inference;
mod server;

pub use inference::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the Cadence service and tools.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "inference": { "genres": ["house", "techno"], "device": "cpu" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CadenceSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Model paths, label space and pipeline parameters.
    pub inference: InferenceSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roundtrips_through_json() {
        let settings = CadenceSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: CadenceSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn json_keys_are_camel_case() {
        let json = serde_json::to_value(CadenceSettings::default()).unwrap();
        assert!(json["server"].get("maxUploadBytes").is_some());
        assert!(json["inference"].get("extractorPath").is_some());
        assert!(json["inference"].get("extractor_path").is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: CadenceSettings =
            serde_json::from_str(r#"{"logging": {"level": "debug"}}"#).unwrap();
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.server, ServerSettings::default());
        assert_eq!(settings.inference, InferenceSettings::default());
    }
}
