//! Per-request orchestration: decode, normalize, extract, pool, classify.

use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, debug, info_span, warn};

use crate::aggregate::mean_pool;
use crate::audio::decode;
use crate::errors::PredictError;
use crate::normalize::normalize;
use crate::registry::{ModelBundle, ModelRegistry};
use crate::types::{PredictionResult, RawAudioBlob};

/// Runs predictions against a shared [`ModelRegistry`].
#[derive(Clone, Debug)]
pub struct Predictor {
    registry: Arc<ModelRegistry>,
}

impl Predictor {
    /// Build a predictor over `registry`.
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this predictor reads.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Classify one uploaded clip.
    ///
    /// Refuses immediately unless the registry is ready. The pipeline runs on
    /// a blocking thread; a panic there is reported as
    /// [`PredictError::Internal`].
    pub async fn predict(&self, blob: RawAudioBlob) -> Result<PredictionResult, PredictError> {
        let format = blob
            .format()
            .map_or_else(|| "unknown".to_string(), |f| f.to_string());
        let span = info_span!("predict", bytes = blob.len(), format = %format);

        async move {
            let bundle = self.registry.bundle().inspect_err(|e| {
                warn!(code = e.code(), error = %e, "prediction refused");
            })?;

            let blocking_span = tracing::Span::current();
            let result = tokio::task::spawn_blocking(move || {
                let _enter = blocking_span.enter();
                run_pipeline(&bundle, &blob)
            })
            .await
            .map_err(|e| PredictError::Internal(format!("pipeline task: {e}")))
            .and_then(|r| r);

            match &result {
                Ok(prediction) => debug!(
                    genre = %prediction.predicted_genre,
                    confidence = prediction.confidence,
                    "prediction complete"
                ),
                Err(e) => warn!(code = e.code(), error = %e, "prediction failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// The synchronous pipeline against a loaded bundle.
pub fn run_pipeline(
    bundle: &ModelBundle,
    blob: &RawAudioBlob,
) -> Result<PredictionResult, PredictError> {
    let started = Instant::now();

    let waveform = decode(blob.bytes().clone(), blob.format())?;
    let decoded_at = Instant::now();
    debug!(
        ms = (decoded_at - started).as_millis(),
        channels = waveform.channels(),
        sample_rate = waveform.sample_rate(),
        seconds = waveform.duration_secs(),
        "decode"
    );

    let normalized = normalize(&waveform, bundle.sample_rate())?;
    drop(waveform);
    let normalized_at = Instant::now();
    debug!(
        ms = (normalized_at - decoded_at).as_millis(),
        samples = normalized.len(),
        "normalize"
    );

    let sequence = bundle.extractor().extract(&normalized)?;
    let extracted_at = Instant::now();
    debug!(
        ms = (extracted_at - normalized_at).as_millis(),
        frames = sequence.frames(),
        dim = sequence.dim(),
        "extract"
    );

    let embedding = mean_pool(&sequence)?;
    let result = bundle.classifier().classify(&embedding, bundle.labels())?;
    debug!(
        ms = extracted_at.elapsed().as_millis(),
        total_ms = started.elapsed().as_millis(),
        "classify"
    );
    Ok(result)
}
