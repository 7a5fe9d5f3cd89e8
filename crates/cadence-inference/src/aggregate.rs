//! Temporal pooling of embedding sequences.

use ndarray::Axis;

use crate::errors::PredictError;
use crate::types::{AggregatedEmbedding, EmbeddingSequence};

/// Mean over the time axis. A single-frame sequence is returned unchanged.
pub fn mean_pool(sequence: &EmbeddingSequence) -> Result<AggregatedEmbedding, PredictError> {
    if sequence.frames() == 0 || sequence.dim() == 0 {
        return Err(PredictError::Aggregation(format!(
            "empty embedding sequence ({} frames x {} dims)",
            sequence.frames(),
            sequence.dim()
        )));
    }
    let view = sequence.view();
    if sequence.frames() == 1 {
        return Ok(AggregatedEmbedding::new(view.row(0).to_owned()));
    }
    view.mean_axis(Axis(0))
        .map(AggregatedEmbedding::new)
        .ok_or_else(|| PredictError::Aggregation("mean over zero frames".into()))
}
