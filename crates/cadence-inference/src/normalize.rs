//! Channel reduction and resampling to the extractor's input format.

use ndarray::Axis;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::errors::PredictError;
use crate::types::{NormalizedWaveform, Waveform};

/// Input frames per resampler call.
const CHUNK_SIZE: usize = 1024;

/// Reduce a waveform to mono by averaging channels at each frame.
///
/// Mono input is copied through unchanged.
pub fn downmix(waveform: &Waveform) -> Vec<f32> {
    if waveform.channels() == 1 {
        return waveform.channel(0).to_vec();
    }
    #[allow(clippy::cast_precision_loss)]
    let n = waveform.channels() as f32;
    waveform
        .samples()
        .axis_iter(Axis(0))
        .map(|frame| frame.iter().sum::<f32>() / n)
        .collect()
}

/// Resample mono audio from `from_rate` to `to_rate` with a windowed-sinc
/// interpolator.
///
/// Output length is `round(len * to_rate / from_rate)` and is time-aligned
/// with the input. Equal rates return the input untouched.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, PredictError> {
    if from_rate == 0 || to_rate == 0 {
        return Err(PredictError::Normalization(format!(
            "invalid sample rates {from_rate} -> {to_rate}"
        )));
    }
    if samples.is_empty() {
        return Err(PredictError::Normalization("no samples to resample".into()));
    }
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let expected = ((samples.len() as f64 * ratio).round() as usize).max(1);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| PredictError::Normalization(format!("resampler init: {e}")))?;
    let mut output = Vec::with_capacity(expected + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let input = [chunk];
        let out = resampler
            .process(&input[..], None)
            .map_err(|e| PredictError::Normalization(format!("resample: {e}")))?;
        output.extend_from_slice(&out[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let input = [remainder];
        let out = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(|e| PredictError::Normalization(format!("resample tail: {e}")))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush with silence until the tail has been emitted.
    while output.len() < expected {
        let out = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| PredictError::Normalization(format!("resample flush: {e}")))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.truncate(expected);
    output.resize(expected, 0.0);
    Ok(output)
}

/// Downmix to mono, then resample to `target_rate`.
///
/// Both steps are linear, so averaging before resampling gives the same
/// result as resampling every channel and averaging after.
pub fn normalize(waveform: &Waveform, target_rate: u32) -> Result<NormalizedWaveform, PredictError> {
    if waveform.is_empty() {
        return Err(PredictError::Normalization("waveform has no frames".into()));
    }
    let mono = downmix(waveform);
    let samples = resample(&mono, waveform.sample_rate(), target_rate)?;
    Ok(NormalizedWaveform::new(samples, target_rate))
}
