//! Model paths, label space and pipeline parameters.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which compute device the extractor should run on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// CUDA when compiled in and available, otherwise CPU.
    #[default]
    Auto,
    /// Always CPU.
    Cpu,
    /// CUDA or fail.
    Cuda,
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        })
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown device '{other}'")),
        }
    }
}

/// Inference pipeline settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferenceSettings {
    /// ONNX export of the embedding extractor.
    pub extractor_path: PathBuf,
    /// JSON checkpoint of the linear classification head.
    pub classifier_path: PathBuf,
    /// Ordered genre label space. Index `i` names classifier output `i`.
    pub genres: Vec<String>,
    /// Sample rate the extractor expects, in Hz.
    pub sample_rate: u32,
    /// Compute device preference.
    pub device: DevicePreference,
    /// Number of extractor sessions in the pool.
    pub extractor_sessions: usize,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Length of the silent probe used to learn the embedding dimension.
    pub probe_seconds: f32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            extractor_path: PathBuf::from("models/m2d_extractor.onnx"),
            classifier_path: PathBuf::from("models/genre_classifier.json"),
            genres: ["ambient", "dnb", "house", "techno", "trance"]
                .into_iter()
                .map(String::from)
                .collect(),
            sample_rate: 16_000,
            device: DevicePreference::Auto,
            extractor_sessions: 1,
            intra_threads: 4,
            probe_seconds: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = InferenceSettings::default();
        assert_eq!(s.genres, ["ambient", "dnb", "house", "techno", "trance"]);
        assert_eq!(s.sample_rate, 16_000);
        assert_eq!(s.device, DevicePreference::Auto);
        assert_eq!(s.extractor_sessions, 1);
    }

    #[test]
    fn device_serde_lowercase() {
        let json = serde_json::to_string(&DevicePreference::Cuda).unwrap();
        assert_eq!(json, "\"cuda\"");
        let back: DevicePreference = serde_json::from_str("\"cpu\"").unwrap();
        assert_eq!(back, DevicePreference::Cpu);
    }

    #[test]
    fn device_from_str() {
        assert_eq!("AUTO".parse(), Ok(DevicePreference::Auto));
        assert_eq!(" gpu ".parse(), Ok(DevicePreference::Cuda));
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn device_display_matches_serde() {
        for d in [
            DevicePreference::Auto,
            DevicePreference::Cpu,
            DevicePreference::Cuda,
        ] {
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json, format!("\"{d}\""));
        }
    }
}
