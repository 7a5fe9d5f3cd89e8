//! Embedding extractor boundary and its ONNX Runtime implementation.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::device::{ComputeDevice, session_builder};
use crate::errors::{LoadError, PredictError, ResultExt};
use crate::types::{EmbeddingSequence, NormalizedWaveform};

/// Maps a normalized mono waveform to a sequence of embedding frames.
///
/// Implementations are deterministic and safe to call from many threads.
pub trait EmbeddingExtractor: Send + Sync {
    /// Run the model on one clip.
    fn extract(&self, waveform: &NormalizedWaveform) -> Result<EmbeddingSequence, PredictError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// A pool of ONNX Runtime sessions over the same extractor model.
///
/// `Session::run` needs `&mut`, so every session has its own mutex. A request
/// holds exactly one of them for the duration of the model call.
pub struct OnnxExtractor {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    device: ComputeDevice,
}

impl OnnxExtractor {
    /// Load `pool_size` sessions from `model_path`.
    pub fn load(
        model_path: &Path,
        device: ComputeDevice,
        pool_size: usize,
        intra_threads: usize,
    ) -> Result<Self, LoadError> {
        if !model_path.is_file() {
            return Err(LoadError::ModelFileNotFound {
                what: "extractor model",
                path: model_path.to_path_buf(),
            });
        }

        info!(
            model = %model_path.display(),
            %device,
            sessions = pool_size,
            intra_threads,
            "loading extractor sessions"
        );

        let mut sessions = Vec::with_capacity(pool_size.max(1));
        for i in 0..pool_size.max(1) {
            let session = session_builder(device, intra_threads)?
                .commit_from_file(model_path)
                .extractor("load model")?;
            debug!(index = i, "extractor session ready");
            sessions.push(Mutex::new(session));
        }

        Ok(Self {
            sessions,
            next: AtomicUsize::new(0),
            device,
        })
    }

    /// Number of sessions in the pool.
    pub fn pool_size(&self) -> usize {
        self.sessions.len()
    }

    /// Device the sessions run on.
    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    fn run(session: &mut Session, samples: &[f32]) -> Result<EmbeddingSequence, PredictError> {
        #[allow(clippy::cast_possible_wrap)]
        let shape = vec![1i64, samples.len() as i64];
        let input = Tensor::from_array((shape, samples.to_vec())).inference("input tensor")?;

        let outputs = session.run(ort::inputs![input]).inference("run extractor")?;
        let (output_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .inference("extract output")?;

        sequence_from_output(output_shape, data)
    }
}

impl fmt::Debug for OnnxExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxExtractor")
            .field("sessions", &self.sessions.len())
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl EmbeddingExtractor for OnnxExtractor {
    fn extract(&self, waveform: &NormalizedWaveform) -> Result<EmbeddingSequence, PredictError> {
        let n = self.sessions.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;

        // Take the first idle session; wait on our round-robin slot otherwise.
        let mut guard = (0..n)
            .find_map(|offset| self.sessions[(start + offset) % n].try_lock())
            .unwrap_or_else(|| self.sessions[start].lock());

        Self::run(&mut guard, waveform.samples())
    }

    fn describe(&self) -> String {
        format!("onnx x{} on {}", self.sessions.len(), self.device)
    }
}

/// Interpret an extractor output tensor as `(frames, dim)`.
///
/// Accepts `[1, T, D]`, `[T, D]` and `[1, D]`.
pub fn sequence_from_output(shape: &[i64], data: &[f32]) -> Result<EmbeddingSequence, PredictError> {
    if shape.iter().any(|&d| d < 0) {
        return Err(PredictError::Inference(format!(
            "dynamic output shape {shape:?}"
        )));
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    let (frames, dim) = match dims.as_slice() {
        [1, t, d] | [t, d] => (*t, *d),
        _ => {
            return Err(PredictError::Inference(format!(
                "unsupported extractor output shape {shape:?}"
            )));
        }
    };
    if frames * dim != data.len() {
        return Err(PredictError::Inference(format!(
            "output shape {shape:?} does not match {} values",
            data.len()
        )));
    }
    let matrix = Array2::from_shape_vec((frames, dim), data.to_vec())
        .inference("output layout")?;
    Ok(EmbeddingSequence::new(matrix))
}
