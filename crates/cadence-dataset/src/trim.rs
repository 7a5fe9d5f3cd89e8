//! Cut clips down to a centred window and write them as 16-bit WAV.

use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use cadence_inference::{AudioFormat, Waveform, decode};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::{DatasetError, Result};
use crate::is_audio_file;

/// Window length when none is given, in seconds.
pub const DEFAULT_TRIM_SECONDS: f64 = 24.0;

/// Suffix of the default output directory.
const OUTPUT_SUFFIX: &str = "-trimmed";

/// Directory trimming options.
#[derive(Clone, Debug, PartialEq)]
pub struct TrimOptions {
    /// Window length in seconds.
    pub seconds: f64,
    /// Output root. Defaults to `<input>-trimmed`.
    pub output_dir: Option<PathBuf>,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_TRIM_SECONDS,
            output_dir: None,
        }
    }
}

/// Outcome of [`trim_directory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrimSummary {
    /// Where the trimmed tree was written.
    pub output_dir: PathBuf,
    /// Clips written.
    pub trimmed: usize,
    /// Clips that failed to decode or write.
    pub failed: usize,
}

/// Frame range of the centred `target`-frame window in a `total`-frame clip.
///
/// Clips no longer than `target` are kept whole.
pub fn trim_window(total: usize, target: usize) -> Range<usize> {
    if total <= target {
        return 0..total;
    }
    let start = total / 2 - target / 2;
    start..start + target
}

/// Decode `input`, keep the centred `seconds` window, and write it to
/// `output` with a `.wav` extension. Returns the written path.
pub fn trim_file(input: &Path, output: &Path, seconds: f64) -> Result<PathBuf> {
    let bytes = fs::read(input).map_err(|e| DatasetError::io(input, e))?;
    let format = input
        .extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension);
    let waveform = decode(bytes, format).map_err(|source| DatasetError::Decode {
        path: input.to_path_buf(),
        source,
    })?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let target = (seconds.max(0.0) * f64::from(waveform.sample_rate())).round() as usize;
    let window = trim_window(waveform.frames(), target);

    let output = output.with_extension("wav");
    write_wav(&output, &waveform, window.clone())?;
    debug!(
        input = %input.display(),
        output = %output.display(),
        frames = window.len(),
        "trimmed"
    );
    Ok(output)
}

fn write_wav(path: &Path, waveform: &Waveform, window: Range<usize>) -> Result<()> {
    let wav_err = |source| DatasetError::Wav {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }

    let channels = u16::try_from(waveform.channels()).map_err(|_| {
        wav_err(hound::Error::Unsupported)
    })?;
    let spec = hound::WavSpec {
        channels,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for frame in waveform
        .samples()
        .rows()
        .into_iter()
        .skip(window.start)
        .take(window.len())
    {
        for &sample in &frame {
            writer.write_sample(to_pcm16(sample)).map_err(wav_err)?;
        }
    }
    writer.finalize().map_err(wav_err)
}

#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

/// `<input>-trimmed` next to `input`.
pub fn default_output_dir(input: &Path) -> PathBuf {
    let mut name = input
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(OUTPUT_SUFFIX);
    input.with_file_name(name)
}

/// Trim every audio file under `input_dir` into a mirrored tree.
///
/// Per-file failures are logged and counted; the walk continues. Clips whose
/// output would land on a file already written in this run (`x.mp3` and
/// `x.flac` both become `x.wav`) count as failures.
pub fn trim_directory(input_dir: &Path, options: &TrimOptions) -> Result<TrimSummary> {
    if !input_dir.is_dir() {
        return Err(DatasetError::NotFound {
            what: "input directory",
            path: input_dir.to_path_buf(),
        });
    }
    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(input_dir));

    let mut summary = TrimSummary {
        output_dir: output_dir.clone(),
        trimmed: 0,
        failed: 0,
    };

    let walker = WalkDir::new(input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != output_dir);
    let mut written: HashMap<PathBuf, PathBuf> = HashMap::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(input_dir) else {
            continue;
        };
        let target = output_dir.join(relative).with_extension("wav");
        let result = match written.get(&target) {
            Some(previous) => Err(DatasetError::OutputCollision {
                path: entry.path().to_path_buf(),
                previous: previous.clone(),
            }),
            None => trim_file(entry.path(), &target, options.seconds),
        };
        match result {
            Ok(out) => {
                let _ = written.insert(out, entry.path().to_path_buf());
                summary.trimmed += 1;
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "trim failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        output = %summary.output_dir.display(),
        trimmed = summary.trimmed,
        failed = summary.failed,
        "trim finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_clip_is_kept_whole() {
        assert_eq!(trim_window(100, 240), 0..100);
        assert_eq!(trim_window(240, 240), 0..240);
        assert_eq!(trim_window(0, 240), 0..0);
    }

    #[test]
    fn long_clip_is_centred() {
        assert_eq!(trim_window(1000, 240), 380..620);
        assert_eq!(trim_window(1001, 240), 380..620);
        assert_eq!(trim_window(1000, 0), 500..500);
    }

    #[test]
    fn pcm_conversion_clamps() {
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(1.0), i16::MAX);
        assert_eq!(to_pcm16(4.0), i16::MAX);
        assert_eq!(to_pcm16(-4.0), -i16::MAX);
    }

    #[test]
    fn default_output_is_a_sibling() {
        assert_eq!(
            default_output_dir(Path::new("/data/genres")),
            PathBuf::from("/data/genres-trimmed")
        );
    }
}
