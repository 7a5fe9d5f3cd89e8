//! One-shot model loading and lock-free access to the loaded bundle.
//!
//! ```text
//! Uninitialized ──begin──▶ Loading ──ok──▶ Ready
//!                             └────err──▶ Failed
//! ```
//!
//! Every transition happens once. There is no reload.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use cadence_settings::InferenceSettings;
use serde::Serialize;
use tracing::{error, info};

use crate::classifier::GenreClassifier;
use crate::device::{ComputeDevice, resolve_device};
use crate::errors::{LoadError, PredictError};
use crate::extractor::{EmbeddingExtractor, OnnxExtractor};
use crate::labels::GenreLabels;
use crate::types::NormalizedWaveform;

/// Lifecycle state of a [`ModelRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryState {
    /// Loading has not started.
    Uninitialized,
    /// Loading is in progress.
    Loading,
    /// Models are loaded and serving.
    Ready,
    /// Loading failed; predictions are refused.
    Failed,
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        })
    }
}

/// Everything a prediction needs, frozen after startup.
pub struct ModelBundle {
    extractor: Arc<dyn EmbeddingExtractor>,
    classifier: GenreClassifier,
    labels: GenreLabels,
    device: ComputeDevice,
    sample_rate: u32,
    embedding_dim: usize,
}

impl ModelBundle {
    /// Assemble a bundle, probing the extractor on silence to learn its
    /// embedding dimension and checking it against the classifier.
    pub fn new(
        extractor: Arc<dyn EmbeddingExtractor>,
        classifier: GenreClassifier,
        labels: GenreLabels,
        device: ComputeDevice,
        sample_rate: u32,
        probe_seconds: f32,
    ) -> Result<Self, LoadError> {
        if sample_rate == 0 {
            return Err(LoadError::Extractor("sample rate must be positive".into()));
        }
        if classifier.output_dim() != labels.len() {
            return Err(LoadError::ModelShapeMismatch(format!(
                "classifier has {} outputs but {} genres are configured",
                classifier.output_dim(),
                labels.len()
            )));
        }

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let probe_len = ((f64::from(probe_seconds) * f64::from(sample_rate)).round() as usize).max(1);
        let probe = NormalizedWaveform::new(vec![0.0; probe_len], sample_rate);
        let sequence = extractor
            .extract(&probe)
            .map_err(|e| LoadError::Extractor(format!("probe inference: {e}")))?;
        let embedding_dim = sequence.dim();

        if embedding_dim == 0 {
            return Err(LoadError::ModelShapeMismatch(
                "extractor produced zero-dimensional embeddings".into(),
            ));
        }
        if embedding_dim != classifier.input_dim() {
            return Err(LoadError::ModelShapeMismatch(format!(
                "extractor emits {embedding_dim}-dim embeddings, classifier expects {}",
                classifier.input_dim()
            )));
        }

        Ok(Self {
            extractor,
            classifier,
            labels,
            device,
            sample_rate,
            embedding_dim,
        })
    }

    /// The embedding extractor.
    pub fn extractor(&self) -> &dyn EmbeddingExtractor {
        self.extractor.as_ref()
    }

    /// The classification head.
    pub fn classifier(&self) -> &GenreClassifier {
        &self.classifier
    }

    /// The genre label space.
    pub fn labels(&self) -> &GenreLabels {
        &self.labels
    }

    /// Device the extractor runs on.
    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    /// Rate the extractor expects, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Embedding dimension learned at load time.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }
}

impl fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBundle")
            .field("extractor", &self.extractor.describe())
            .field("labels", &self.labels)
            .field("device", &self.device)
            .field("sample_rate", &self.sample_rate)
            .field("embedding_dim", &self.embedding_dim)
            .finish_non_exhaustive()
    }
}

/// Load every model named in `settings` and check that their shapes agree.
///
/// Order: labels, device, classifier checkpoint, extractor sessions, probe.
pub fn initialize(settings: &InferenceSettings) -> Result<ModelBundle, LoadError> {
    let labels = GenreLabels::new(settings.genres.clone())?;
    let device = resolve_device(settings.device)?;
    let classifier = GenreClassifier::from_checkpoint(&settings.classifier_path, &labels)?;
    info!(
        path = %settings.classifier_path.display(),
        input_dim = classifier.input_dim(),
        output_dim = classifier.output_dim(),
        "classifier loaded"
    );

    let extractor = OnnxExtractor::load(
        &settings.extractor_path,
        device,
        settings.extractor_sessions,
        settings.intra_threads,
    )?;

    ModelBundle::new(
        Arc::new(extractor),
        classifier,
        labels,
        device,
        settings.sample_rate,
        settings.probe_seconds,
    )
}

/// Owner of the process's model bundle.
///
/// Construct one, share it by `Arc`, and call [`ModelRegistry::load`] once.
/// Readers never lock.
#[derive(Default)]
pub struct ModelRegistry {
    started: AtomicBool,
    outcome: OnceLock<Result<Arc<ModelBundle>, String>>,
}

impl ModelRegistry {
    /// An uninitialized registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RegistryState {
        match self.outcome.get() {
            Some(Ok(_)) => RegistryState::Ready,
            Some(Err(_)) => RegistryState::Failed,
            None if self.started.load(Ordering::Acquire) => RegistryState::Loading,
            None => RegistryState::Uninitialized,
        }
    }

    /// The loaded bundle, or the error a prediction should report.
    pub fn bundle(&self) -> Result<Arc<ModelBundle>, PredictError> {
        match self.outcome.get() {
            Some(Ok(bundle)) => Ok(Arc::clone(bundle)),
            Some(Err(message)) => Err(PredictError::StartupFailed(message.clone())),
            None => Err(PredictError::ServiceNotReady {
                state: if self.started.load(Ordering::Acquire) {
                    RegistryState::Loading
                } else {
                    RegistryState::Uninitialized
                },
            }),
        }
    }

    /// The load failure message, once failed.
    pub fn failure(&self) -> Option<&str> {
        match self.outcome.get() {
            Some(Err(message)) => Some(message),
            _ => None,
        }
    }

    /// Load from settings. Blocks; run it on a blocking thread.
    pub fn load(&self, settings: &InferenceSettings) -> Result<Arc<ModelBundle>, LoadError> {
        self.load_with(|| initialize(settings))
    }

    /// Load through `build`, which runs at most once per registry.
    ///
    /// A second call returns [`LoadError::AlreadyStarted`] without running
    /// `build` or changing the state.
    pub fn load_with<F>(&self, build: F) -> Result<Arc<ModelBundle>, LoadError>
    where
        F: FnOnce() -> Result<ModelBundle, LoadError>,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LoadError::AlreadyStarted);
        }
        info!("model loading started");
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(build))
            .unwrap_or_else(|payload| Err(LoadError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                let _ = self.outcome.set(Ok(Arc::clone(&bundle)));
                info!(
                    elapsed_ms = started.elapsed().as_millis(),
                    genres = bundle.labels().len(),
                    embedding_dim = bundle.embedding_dim(),
                    device = %bundle.device(),
                    "models ready"
                );
                Ok(bundle)
            }
            Err(e) => {
                error!(error = %e, "model loading failed");
                let _ = self.outcome.set(Err(e.to_string()));
                Err(e)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("state", &self.state())
            .finish()
    }
}
