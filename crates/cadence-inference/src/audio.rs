//! Audio decoding via symphonia.

use std::io::Cursor;

use bytes::Bytes;
use ndarray::Array2;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::errors::PredictError;
use crate::types::{AudioFormat, Waveform};

/// Decode an encoded audio buffer into a `(frames, channels)` waveform at its
/// native sample rate.
///
/// `format` seeds the container probe. Without it symphonia sniffs the
/// content. Corrupt packets are skipped; a stream where nothing decodes is an
/// error.
pub fn decode(data: impl Into<Bytes>, format: Option<AudioFormat>) -> Result<Waveform, PredictError> {
    let data = data.into();
    if data.is_empty() {
        return Err(PredictError::Decode("empty input".into()));
    }

    let mss = MediaSourceStream::new(
        Box::new(Cursor::new(data)),
        MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(format) = format {
        let _ = hint.with_extension(format.extension());
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PredictError::Decode(format!("unrecognized container: {e}")))?;

    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PredictError::Decode("no audio track found".into()))?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PredictError::Decode(format!("unsupported codec: {e}")))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channels = codec_params.channels.map(|c| c.count());
    let mut sample_rate = codec_params.sample_rate;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut skipped = 0usize;

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PredictError::Decode(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(SymphoniaError::DecodeError(e)) => {
                skipped += 1;
                debug!(error = e, "skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(PredictError::Decode(format!("decode: {e}"))),
        };

        let spec = *decoded.spec();
        let count = spec.channels.count();
        match channels {
            Some(c) if c != count && !interleaved.is_empty() => {
                return Err(PredictError::Decode(format!(
                    "channel count changed mid-stream ({c} -> {count})"
                )));
            }
            _ => channels = Some(count),
        }
        sample_rate = Some(spec.rate);

        let needed = decoded.capacity() * count;
        if sample_buf.as_ref().is_none_or(|b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    let channels = channels.unwrap_or(1).max(1);
    let frames = interleaved.len() / channels;
    if frames == 0 {
        let reason = if skipped > 0 {
            format!("all {skipped} packets failed to decode")
        } else {
            "stream contains no audio frames".to_string()
        };
        return Err(PredictError::Decode(reason));
    }
    interleaved.truncate(frames * channels);

    let sample_rate =
        sample_rate.ok_or_else(|| PredictError::Decode("stream has no sample rate".into()))?;
    let matrix = Array2::from_shape_vec((frames, channels), interleaved)
        .map_err(|e| PredictError::Decode(format!("sample layout: {e}")))?;
    let waveform =
        Waveform::new(matrix, sample_rate).map_err(|e| PredictError::Decode(e.to_string()))?;

    debug!(
        frames,
        channels,
        sample_rate,
        skipped,
        "decoded audio"
    );
    Ok(waveform)
}
