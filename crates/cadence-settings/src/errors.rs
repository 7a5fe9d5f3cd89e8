//! Settings errors.

use std::path::PathBuf;

use thiserror::Error;

/// Loading or validation failure.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Settings file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON, or does not fit the settings schema.
    #[error("malformed settings{}: {source}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Json {
        /// Settings file, when the error came from one.
        path: Option<PathBuf>,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value failed validation.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

impl SettingsError {
    pub(crate) fn json(path: Option<&std::path::Path>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.map(std::path::Path::to_path_buf);
        move |source| Self::Json { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_names_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = SettingsError::json(Some(std::path::Path::new("/etc/cadence.json")))(source);
        let msg = err.to_string();
        assert!(msg.starts_with("malformed settings in /etc/cadence.json"), "{msg}");
    }

    #[test]
    fn json_error_without_file() {
        let source = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        let err = SettingsError::json(None)(source);
        assert!(err.to_string().starts_with("malformed settings: "));
    }

    #[test]
    fn io_error_keeps_source() {
        let err = SettingsError::Io {
            path: PathBuf::from("cadence.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("cadence.json"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
