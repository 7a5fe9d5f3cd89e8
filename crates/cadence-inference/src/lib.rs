//! # cadence-inference
//!
//! The inference pipeline behind the genre classification service.
//!
//! # Architecture
//!
//! ```text
//! upload bytes → symphonia decode → Waveform (frames × channels, native rate)
//! → downmix to mono → rubato resample to the extractor rate
//! → ONNX extractor [1, samples] → embeddings [T, D]
//! → mean over T → linear head W·x + b → softmax → arg-max genre
//! ```
//!
//! Models are loaded once through a [`ModelRegistry`] and shared by `Arc`.
//! [`Predictor`] checks the registry, then runs the pipeline on a blocking
//! thread.

#![deny(unsafe_code)]

pub mod aggregate;
pub mod audio;
pub mod classifier;
pub mod device;
pub mod errors;
pub mod extractor;
pub mod labels;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod normalize;
pub mod predictor;
pub mod registry;
pub mod types;

pub use aggregate::mean_pool;
pub use audio::decode;
pub use classifier::{GenreClassifier, argmax, softmax};
pub use device::{ComputeDevice, resolve_device};
pub use errors::{LoadError, PredictError};
pub use extractor::{EmbeddingExtractor, OnnxExtractor};
pub use labels::GenreLabels;
pub use normalize::{downmix, normalize, resample};
pub use predictor::{Predictor, run_pipeline};
pub use registry::{ModelBundle, ModelRegistry, RegistryState, initialize};
pub use types::{
    AggregatedEmbedding, AudioFormat, EmbeddingSequence, NormalizedWaveform, PredictionResult,
    RawAudioBlob, Waveform,
};
