//! Deterministic stand-in for the ONNX extractor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array2};

use crate::classifier::GenreClassifier;
use crate::device::ComputeDevice;
use crate::errors::{LoadError, PredictError};
use crate::extractor::EmbeddingExtractor;
use crate::labels::GenreLabels;
use crate::registry::ModelBundle;
use crate::types::{EmbeddingSequence, NormalizedWaveform};

/// A 16 kHz bundle over a [`MockExtractor`] of `dim` dimensions and a
/// classifier with fixed, distinct weights per genre.
///
/// The extractor handle is returned so tests can count model calls.
pub fn mock_bundle(
    genres: &[&str],
    dim: usize,
) -> Result<(Arc<MockExtractor>, ModelBundle), LoadError> {
    let labels = GenreLabels::new(genres.iter().map(|g| (*g).to_string()).collect())?;
    #[allow(clippy::cast_precision_loss)]
    let weight = Array2::from_shape_fn((labels.len(), dim), |(g, d)| {
        ((g + 1) as f32 * (d + 1) as f32 * 0.37).sin()
    });
    #[allow(clippy::cast_precision_loss)]
    let bias = Array1::from_shape_fn(labels.len(), |g| g as f32 * 0.01);
    let classifier = GenreClassifier::new(weight, bias)?;

    let extractor = Arc::new(MockExtractor::new(dim));
    let bundle = ModelBundle::new(
        Arc::clone(&extractor) as Arc<dyn EmbeddingExtractor>,
        classifier,
        labels,
        ComputeDevice::Cpu,
        16_000,
        0.1,
    )?;
    Ok((extractor, bundle))
}

/// Emits one embedding row per `frame_len` samples, computed from simple
/// per-frame statistics. Counts its calls.
#[derive(Debug)]
pub struct MockExtractor {
    dim: usize,
    frame_len: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl MockExtractor {
    /// `dim`-dimensional embeddings over one-second frames at 16 kHz.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            frame_len: 16_000,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Use `frame_len` samples per embedding row.
    #[must_use]
    pub fn with_frame_len(mut self, frame_len: usize) -> Self {
        self.frame_len = frame_len.max(1);
        self
    }

    /// An extractor whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(1)
        }
    }

    /// Number of `extract` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingExtractor for MockExtractor {
    fn extract(&self, waveform: &NormalizedWaveform) -> Result<EmbeddingSequence, PredictError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PredictError::Inference("mock extractor failure".into()));
        }

        let samples = waveform.samples();
        let frames = samples.len().div_ceil(self.frame_len).max(1);
        let mut out = Array2::<f32>::zeros((frames, self.dim));

        for (mut row, chunk) in out.rows_mut().into_iter().zip(samples.chunks(self.frame_len)) {
            #[allow(clippy::cast_precision_loss)]
            let n = chunk.len() as f32;
            let mean = chunk.iter().sum::<f32>() / n;
            let rms = (chunk.iter().map(|s| s * s).sum::<f32>() / n).sqrt();
            for (d, v) in row.iter_mut().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let phase = (d + 1) as f32;
                *v = rms * phase.sin() + mean * phase.cos();
            }
        }

        Ok(EmbeddingSequence::new(out))
    }

    fn describe(&self) -> String {
        format!("mock dim={} frame_len={}", self.dim, self.frame_len)
    }
}
