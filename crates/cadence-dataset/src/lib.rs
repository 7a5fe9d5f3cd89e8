//! # cadence-dataset
//!
//! Offline tools for building a genre training set from a directory tree:
//!
//! - [`crawl`]: sample up to N audio files per genre directory into a
//!   `path,genre` CSV manifest
//! - [`clean`]: delete every audio file the manifest did not keep
//! - [`trim`]: cut each clip down to a centred window, written as WAV

#![deny(unsafe_code)]

use std::path::Path;

use cadence_inference::AudioFormat;

pub mod clean;
pub mod crawl;
pub mod errors;
pub mod trim;

pub use clean::{CONFIRM_PROMPT, CleanPlan, confirm, execute_clean, plan_clean, read_manifest};
pub use crawl::{CrawlOptions, DatasetManifest, ManifestEntry, crawl, write_manifest};
pub use errors::{DatasetError, Result};
pub use trim::{TrimOptions, TrimSummary, trim_directory, trim_file, trim_window};

/// Whether `path` has one of the supported audio extensions, ignoring case.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            AudioFormat::ALL
                .iter()
                .any(|f| ext.eq_ignore_ascii_case(f.extension()))
        })
}
