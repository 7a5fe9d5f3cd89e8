//! Error types for the inference pipeline.
//!
//! [`PredictError`] is request-scoped: it aborts one prediction and never
//! touches the loaded models. [`LoadError`] is startup-scoped: it leaves the
//! registry in the failed state for the rest of the process lifetime.

use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::RegistryState;

/// Errors raised while serving a single prediction.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The upload could not be decoded into audio.
    #[error("audio decode failed: {0}")]
    Decode(String),

    /// Downmixing or resampling failed.
    #[error("waveform normalization failed: {0}")]
    Normalization(String),

    /// The embedding sequence could not be reduced to one vector.
    #[error("embedding aggregation failed: {0}")]
    Aggregation(String),

    /// The classifier produced unusable logits.
    #[error("classification failed: {0}")]
    Classification(String),

    /// The extractor model call failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Models are not loaded yet.
    #[error("service not ready (models {state})")]
    ServiceNotReady {
        /// Registry state observed when the request arrived.
        state: RegistryState,
    },

    /// Model loading failed at startup; predictions are disabled.
    #[error("model loading failed at startup: {0}")]
    StartupFailed(String),

    /// Anything else, including a panic in the pipeline task.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PredictError {
    /// Stable machine-readable code for the error response.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "DECODE_ERROR",
            Self::Normalization(_) => "NORMALIZATION_ERROR",
            Self::Aggregation(_) => "AGGREGATION_ERROR",
            Self::Classification(_) | Self::Inference(_) => "INFERENCE_ERROR",
            Self::ServiceNotReady { .. } => "SERVICE_NOT_READY",
            Self::StartupFailed(_) => "MODEL_LOAD_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the client sent something the pipeline cannot use.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Normalization(_))
    }
}

/// Errors raised while loading the model bundle.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A model file does not exist.
    #[error("{what} not found at {}", path.display())]
    ModelFileNotFound {
        /// Which file was expected.
        what: &'static str,
        /// Where it was expected.
        path: PathBuf,
    },

    /// Extractor, classifier and label dimensions disagree.
    #[error("model shape mismatch: {0}")]
    ModelShapeMismatch(String),

    /// The requested compute device cannot be used.
    #[error("compute device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The classifier checkpoint could not be read or parsed.
    #[error("invalid classifier checkpoint: {0}")]
    Checkpoint(String),

    /// Building or probing the extractor failed.
    #[error("extractor load failed: {0}")]
    Extractor(String),

    /// The configured genre label space is unusable.
    #[error("invalid genre labels: {0}")]
    InvalidLabels(String),

    /// The loader panicked.
    #[error("model loading panicked: {0}")]
    Panicked(String),

    /// Loading was already started once for this registry.
    #[error("model loading already started")]
    AlreadyStarted,
}

/// Attach context to foreign errors while converting them.
pub trait ResultExt<T> {
    /// Map the error to [`PredictError::Inference`].
    fn inference(self, context: &str) -> Result<T, PredictError>;

    /// Map the error to [`LoadError::Extractor`].
    fn extractor(self, context: &str) -> Result<T, LoadError>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn inference(self, context: &str) -> Result<T, PredictError> {
        self.map_err(|e| PredictError::Inference(format!("{context}: {e}")))
    }

    fn extractor(self, context: &str) -> Result<T, LoadError> {
        self.map_err(|e| LoadError::Extractor(format!("{context}: {e}")))
    }
}
