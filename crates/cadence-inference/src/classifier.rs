//! Linear classification head over aggregated embeddings.
//!
//! Weights follow the PyTorch `nn.Linear` layout: `weight` is
//! `(output_dim, input_dim)` and `bias` is `(output_dim)`. Checkpoints are the
//! head's `state_dict` exported to JSON:
//!
//! ```json
//! {"model_state_dict": {"weight": [[0.1, 0.2], [0.3, 0.4]], "bias": [0.0, 0.0]},
//!  "genres": ["house", "techno"]}
//! ```

use std::path::Path;

use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::errors::{LoadError, PredictError};
use crate::labels::GenreLabels;
use crate::types::{AggregatedEmbedding, PredictionResult};

#[derive(Debug, Deserialize)]
struct Checkpoint {
    model_state_dict: StateDict,
    #[serde(default)]
    genres: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct StateDict {
    weight: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// A loaded linear head: `logits = W · x + b`.
#[derive(Clone, Debug, PartialEq)]
pub struct GenreClassifier {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl GenreClassifier {
    /// Build from in-memory parameters.
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self, LoadError> {
        if weight.nrows() != bias.len() {
            return Err(LoadError::ModelShapeMismatch(format!(
                "weight has {} rows but bias has {} entries",
                weight.nrows(),
                bias.len()
            )));
        }
        if weight.is_empty() {
            return Err(LoadError::ModelShapeMismatch(format!(
                "weight matrix is empty ({:?})",
                weight.dim()
            )));
        }
        if weight.iter().chain(bias.iter()).any(|v| !v.is_finite()) {
            return Err(LoadError::Checkpoint("parameters contain NaN or infinity".into()));
        }
        Ok(Self { weight, bias })
    }

    /// Read a JSON checkpoint and check it against the label space.
    pub fn from_checkpoint(path: &Path, labels: &GenreLabels) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::ModelFileNotFound {
                what: "classifier checkpoint",
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Checkpoint(format!("{}: {e}", path.display())))?;
        Self::from_json(&content, labels)
    }

    /// Parse checkpoint JSON and check it against the label space.
    pub fn from_json(json: &str, labels: &GenreLabels) -> Result<Self, LoadError> {
        let checkpoint: Checkpoint =
            serde_json::from_str(json).map_err(|e| LoadError::Checkpoint(e.to_string()))?;

        if let Some(genres) = &checkpoint.genres {
            if genres.as_slice() != labels.as_slice() {
                return Err(LoadError::InvalidLabels(format!(
                    "checkpoint was trained on {genres:?} but settings list {:?}",
                    labels.as_slice()
                )));
            }
        }

        let StateDict { weight, bias } = checkpoint.model_state_dict;
        let rows = weight.len();
        let cols = weight.first().map_or(0, Vec::len);
        if let Some((i, row)) = weight.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(LoadError::ModelShapeMismatch(format!(
                "weight row {i} has {} columns, expected {cols}",
                row.len()
            )));
        }
        let flat: Vec<f32> = weight.into_iter().flatten().collect();
        let weight = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| LoadError::ModelShapeMismatch(e.to_string()))?;

        let classifier = Self::new(weight, Array1::from(bias))?;
        if classifier.output_dim() != labels.len() {
            return Err(LoadError::ModelShapeMismatch(format!(
                "classifier has {} outputs but {} genres are configured",
                classifier.output_dim(),
                labels.len()
            )));
        }
        Ok(classifier)
    }

    /// Expected embedding dimension.
    pub fn input_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Number of genres scored.
    pub fn output_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// Raw scores, one per genre.
    pub fn logits(&self, embedding: &AggregatedEmbedding) -> Result<Array1<f32>, PredictError> {
        if embedding.dim() != self.input_dim() {
            return Err(PredictError::Aggregation(format!(
                "embedding has {} dims, classifier expects {}",
                embedding.dim(),
                self.input_dim()
            )));
        }
        Ok(self.weight.dot(&embedding.view()) + &self.bias)
    }

    /// Score an embedding and pick the most probable genre.
    pub fn classify(
        &self,
        embedding: &AggregatedEmbedding,
        labels: &GenreLabels,
    ) -> Result<PredictionResult, PredictError> {
        let logits = self.logits(embedding)?.to_vec();
        let probabilities = softmax(&logits)?;
        let best = argmax(&probabilities)
            .ok_or_else(|| PredictError::Classification("no classes to score".into()))?;

        let predicted_genre = labels
            .name(best)
            .ok_or_else(|| {
                PredictError::Internal(format!("label index {best} outside label space"))
            })?
            .to_string();

        let all_probabilities = labels
            .iter()
            .zip(&probabilities)
            .map(|(name, p)| (name.to_string(), *p))
            .collect();

        Ok(PredictionResult {
            predicted_genre,
            confidence: probabilities[best],
            all_probabilities,
        })
    }
}

/// Numerically stable softmax.
///
/// Non-finite logits are rejected rather than propagated as NaN.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, PredictError> {
    if logits.is_empty() {
        return Err(PredictError::Classification("softmax over zero logits".into()));
    }
    if let Some(bad) = logits.iter().find(|v| !v.is_finite()) {
        return Err(PredictError::Classification(format!("non-finite logit {bad}")));
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
