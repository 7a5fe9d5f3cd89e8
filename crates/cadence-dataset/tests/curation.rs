//! Crawl, clean, and trim against a synthetic genre tree.

use std::fs;
use std::path::Path;

use cadence_core::logging::capture_logs;
use cadence_dataset::{
    CrawlOptions, TrimOptions, crawl, execute_clean, plan_clean, read_manifest, trim_directory,
    trim_file, write_manifest,
};
use tempfile::TempDir;
use tracing::Level;

fn write_tone(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let frames = (seconds * sample_rate as f32) as u32;
    for i in 0..frames {
        for _ in 0..channels {
            #[allow(clippy::cast_possible_truncation)]
            let s = ((i as f32 * 0.03).sin() * 10_000.0) as i16;
            writer.write_sample(s).unwrap();
        }
    }
    writer.finalize().unwrap();
}

#[test]
fn crawl_then_clean_keeps_only_the_sample() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("genres");
    for genre in ["house", "trance"] {
        for i in 0..6 {
            let path = root.join(genre).join(format!("{i}.mp3"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"not really audio").unwrap();
        }
    }

    let manifest = crawl(
        &root,
        &CrawlOptions {
            per_genre: 2,
            seed: Some(42),
        },
    )
    .unwrap();
    assert_eq!(manifest.len(), 4);
    let csv_path = dir.path().join("sample.csv");
    write_manifest(&csv_path, &manifest).unwrap();

    let keep = read_manifest(&csv_path).unwrap();
    assert_eq!(keep.len(), 4);
    let plan = plan_clean(&root, &keep).unwrap();
    assert_eq!(plan.to_delete.len(), 8);
    assert_eq!(plan.kept, 4);
    assert_eq!(execute_clean(&plan), 8);

    for entry in manifest.entries() {
        assert!(entry.path.exists(), "{}", entry.path.display());
    }
    let remaining = walk_count(&root);
    assert_eq!(remaining, 4);
}

fn walk_count(root: &Path) -> usize {
    let mut n = 0;
    for genre in fs::read_dir(root).unwrap() {
        n += fs::read_dir(genre.unwrap().path()).unwrap().count();
    }
    n
}

#[test]
fn trim_file_keeps_rate_and_channels() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("long.wav");
    write_tone(&input, 8000, 2, 3.0);

    let written = trim_file(&input, &dir.path().join("out/short.flac"), 1.0).unwrap();
    assert_eq!(written.extension().unwrap(), "wav");

    let reader = hound::WavReader::open(&written).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 8000);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration(), 8000);
}

#[test]
fn trim_directory_mirrors_tree_and_counts_failures() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("genres");
    write_tone(&input.join("dnb/a.wav"), 16_000, 1, 2.0);
    write_tone(&input.join("dnb/nested/b.wav"), 22_050, 1, 0.5);
    fs::write(input.join("dnb/broken.mp3"), b"garbage").unwrap();
    fs::write(input.join("dnb/notes.txt"), b"skip me").unwrap();

    let (logs, _guard) = capture_logs();
    let summary = trim_directory(
        &input,
        &TrimOptions {
            seconds: 1.0,
            output_dir: None,
        },
    )
    .unwrap();

    assert_eq!(summary.output_dir, dir.path().join("genres-trimmed"));
    assert_eq!(summary.trimmed, 2);
    assert_eq!(summary.failed, 1);
    assert!(logs.has_event(Level::WARN, "trim failed"));

    let a = hound::WavReader::open(summary.output_dir.join("dnb/a.wav")).unwrap();
    assert_eq!(a.duration(), 16_000);
    let b = hound::WavReader::open(summary.output_dir.join("dnb/nested/b.wav")).unwrap();
    assert_eq!(b.duration(), 11_025);
    assert!(!summary.output_dir.join("dnb/notes.wav").exists());
}

#[test]
fn clips_sharing_a_stem_do_not_overwrite_each_other() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("genres");
    // WAV bytes under a .flac name; the decoder probes the content.
    write_tone(&input.join("house/x.flac"), 8000, 2, 2.0);
    write_tone(&input.join("house/x.wav"), 16_000, 1, 2.0);

    let (logs, _guard) = capture_logs();
    let summary = trim_directory(&input, &TrimOptions::default()).unwrap();

    assert_eq!(summary.trimmed, 1);
    assert_eq!(summary.failed, 1);
    assert!(logs.has_event(Level::WARN, "trim failed"));

    // x.flac sorts first and keeps the shared output.
    let kept = hound::WavReader::open(summary.output_dir.join("house/x.wav")).unwrap();
    assert_eq!(kept.spec().sample_rate, 8000);
    assert_eq!(kept.spec().channels, 2);
}

#[test]
fn trim_missing_directory_is_error() {
    let dir = TempDir::new().unwrap();
    assert!(trim_directory(&dir.path().join("absent"), &TrimOptions::default()).is_err());
}
