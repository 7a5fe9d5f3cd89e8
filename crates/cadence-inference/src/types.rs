//! Data model flowing through the pipeline.

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Audio container formats the decoder is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// MPEG-1/2 layer III.
    Mp3,
    /// RIFF WAVE.
    Wav,
    /// FLAC.
    Flac,
    /// MPEG-4 audio (AAC or ALAC in an ISO-BMFF container).
    M4a,
    /// Ogg Vorbis.
    Ogg,
    /// Raw ADTS AAC.
    Aac,
}

impl AudioFormat {
    /// Every supported format.
    pub const ALL: [Self; 6] = [
        Self::Mp3,
        Self::Wav,
        Self::Flac,
        Self::M4a,
        Self::Ogg,
        Self::Aac,
    ];

    /// Canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Aac => "aac",
        }
    }

    /// Match a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" | "wave" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            "m4a" | "mp4" => Some(Self::M4a),
            "ogg" | "oga" => Some(Self::Ogg),
            "aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Match a MIME type. Parameters after `;` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg-3" => Some(Self::Mp3),
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some(Self::Wav),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some(Self::M4a),
            "audio/ogg" | "audio/vorbis" | "application/ogg" => Some(Self::Ogg),
            "audio/aac" | "audio/aacp" | "audio/x-aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Infer from an upload's file name, falling back to its MIME type.
    pub fn infer(filename: Option<&str>, mime: Option<&str>) -> Option<Self> {
        filename
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .or_else(|| mime.and_then(Self::from_mime))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Uploaded audio bytes, valid for one request.
#[derive(Clone, Debug)]
pub struct RawAudioBlob {
    bytes: Bytes,
    format: Option<AudioFormat>,
}

impl RawAudioBlob {
    /// Wrap bytes with an optional format hint.
    pub fn new(bytes: impl Into<Bytes>, format: Option<AudioFormat>) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Declared or inferred container format.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Why a sample matrix cannot be a [`Waveform`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaveformError {
    /// Sample rate was zero.
    #[error("sample rate must be positive")]
    ZeroSampleRate,
    /// The matrix has no channel column.
    #[error("waveform must have at least one channel")]
    NoChannels,
}

/// Decoded audio: a `(frames, channels)` sample matrix plus its rate.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    samples: Array2<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Build a waveform, rejecting a zero rate or zero channels.
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> Result<Self, WaveformError> {
        if sample_rate == 0 {
            return Err(WaveformError::ZeroSampleRate);
        }
        if samples.ncols() == 0 {
            return Err(WaveformError::NoChannels);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build a single-channel waveform from a sample vector.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, WaveformError> {
        let frames = samples.len();
        let matrix = Array2::from_shape_vec((frames, 1), samples)
            .map_err(|_| WaveformError::NoChannels)?;
        Self::new(matrix, sample_rate)
    }

    /// The `(frames, channels)` sample matrix.
    pub fn samples(&self) -> ArrayView2<'_, f32> {
        self.samples.view()
    }

    /// One channel's samples.
    pub fn channel(&self, index: usize) -> ArrayView1<'_, f32> {
        self.samples.index_axis(Axis(1), index)
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count, always at least one.
    pub fn channels(&self) -> usize {
        self.samples.ncols()
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.nrows()
    }

    /// Whether there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Mono audio at the extractor's rate. Only the normalizer creates these.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedWaveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl NormalizedWaveform {
    pub(crate) fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Mono samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sample count.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Extractor output: one embedding row per time frame.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingSequence(Array2<f32>);

impl EmbeddingSequence {
    /// Wrap a `(frames, dim)` matrix.
    pub fn new(frames: Array2<f32>) -> Self {
        Self(frames)
    }

    /// Number of time frames.
    pub fn frames(&self) -> usize {
        self.0.nrows()
    }

    /// Embedding dimension.
    pub fn dim(&self) -> usize {
        self.0.ncols()
    }

    /// The `(frames, dim)` matrix.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }
}

/// A single embedding vector for the whole clip.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedEmbedding(Array1<f32>);

impl AggregatedEmbedding {
    /// Wrap a vector.
    pub fn new(values: Array1<f32>) -> Self {
        Self(values)
    }

    /// Embedding dimension.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// The vector.
    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.0.view()
    }
}

/// Classifier output returned to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Arg-max genre.
    pub predicted_genre: String,
    /// Probability of `predicted_genre`.
    pub confidence: f32,
    /// Every genre's probability, in label-space order.
    #[serde(serialize_with = "serialize_ordered_map")]
    pub all_probabilities: Vec<(String, f32)>,
}

impl PredictionResult {
    /// Probability assigned to `genre`.
    pub fn probability(&self, genre: &str) -> Option<f32> {
        self.all_probabilities
            .iter()
            .find(|(name, _)| name == genre)
            .map(|(_, p)| *p)
    }
}

fn serialize_ordered_map<S: Serializer>(
    pairs: &[(String, f32)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (genre, p) in pairs {
        map.serialize_entry(genre, p)?;
    }
    map.end()
}
