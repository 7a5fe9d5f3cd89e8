//! Genre directory crawler and per-genre sampler.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::{DatasetError, Result};
use crate::is_audio_file;

/// Files kept per genre when no limit is given.
pub const DEFAULT_PER_GENRE: usize = 25;

/// Sampling options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Upper bound on files per genre.
    pub per_genre: usize,
    /// Fixed RNG seed for a reproducible sample.
    pub seed: Option<u64>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            per_genre: DEFAULT_PER_GENRE,
            seed: None,
        }
    }
}

/// One sampled file. Field order is the CSV column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Audio file path as walked.
    pub path: PathBuf,
    /// Name of the genre directory it came from.
    pub genre: String,
}

/// Sampled files ordered by genre, then path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatasetManifest {
    entries: Vec<ManifestEntry>,
}

impl DatasetManifest {
    /// All entries.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was sampled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files per genre.
    pub fn summary(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.genre.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Walk each immediate subdirectory of `root` as a genre and sample its audio
/// files.
pub fn crawl(root: &Path, options: &CrawlOptions) -> Result<DatasetManifest> {
    if !root.is_dir() {
        return Err(DatasetError::NotFound {
            what: "dataset root",
            path: root.to_path_buf(),
        });
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut genres = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| DatasetError::io(root, e))? {
        let entry = entry.map_err(|e| DatasetError::io(root, e))?;
        if entry.path().is_dir() {
            genres.push((
                entry.file_name().to_string_lossy().into_owned(),
                entry.path(),
            ));
        }
    }
    genres.sort();

    let mut entries = Vec::new();
    for (genre, dir) in genres {
        let files = audio_files(&dir)?;
        if files.is_empty() {
            debug!(genre = %genre, "no audio files, skipping");
            continue;
        }

        let found = files.len();
        let mut kept: Vec<PathBuf> = if found > options.per_genre {
            files
                .choose_multiple(&mut rng, options.per_genre)
                .cloned()
                .collect()
        } else {
            files
        };
        kept.sort();

        info!(genre = %genre, found, kept = kept.len(), "genre sampled");
        entries.extend(kept.into_iter().map(|path| ManifestEntry {
            path,
            genre: genre.clone(),
        }));
    }

    Ok(DatasetManifest { entries })
}

/// Every audio file under `dir`, sorted.
pub(crate) fn audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() && is_audio_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Write `manifest` as a `path,genre` CSV.
pub fn write_manifest(path: &Path, manifest: &DatasetManifest) -> Result<()> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    if manifest.is_empty() {
        writer.write_record(["path", "genre"]).map_err(csv_err)?;
    }
    for entry in manifest.entries() {
        writer.serialize(entry).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| DatasetError::io(path, e))?;

    info!(path = %path.display(), rows = manifest.len(), "manifest written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..40 {
            touch(dir.path(), &format!("techno/album{}/track{i:02}.mp3", i % 3));
        }
        for i in 0..3 {
            touch(dir.path(), &format!("ambient/t{i}.FLAC"));
        }
        touch(dir.path(), "ambient/cover.jpg");
        touch(dir.path(), "empty/readme.txt");
        touch(dir.path(), "loose.mp3");
        dir
    }

    #[test]
    fn samples_at_most_per_genre() {
        let dir = tree();
        let manifest = crawl(dir.path(), &CrawlOptions::default()).unwrap();
        let summary = manifest.summary();
        assert_eq!(summary.get("techno"), Some(&DEFAULT_PER_GENRE));
        assert_eq!(summary.get("ambient"), Some(&3));
        assert!(!summary.contains_key("empty"));
        assert_eq!(manifest.len(), DEFAULT_PER_GENRE + 3);
    }

    #[test]
    fn ordered_by_genre_then_path() {
        let dir = tree();
        let manifest = crawl(dir.path(), &CrawlOptions::default()).unwrap();
        let keys: Vec<_> = manifest
            .entries()
            .iter()
            .map(|e| (e.genre.clone(), e.path.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(manifest.entries()[0].genre, "ambient");
    }

    #[test]
    fn seed_makes_sample_reproducible() {
        let dir = tree();
        let options = CrawlOptions {
            per_genre: 5,
            seed: Some(7),
        };
        let a = crawl(dir.path(), &options).unwrap();
        let b = crawl(dir.path(), &options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.summary().get("techno"), Some(&5));
    }

    #[test]
    fn missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let err = crawl(&dir.path().join("nope"), &CrawlOptions::default()).unwrap_err();
        assert_matches!(err, DatasetError::NotFound { what: "dataset root", .. });
    }

    #[test]
    fn manifest_csv_has_header_and_rows() {
        let dir = tree();
        let manifest = crawl(
            dir.path(),
            &CrawlOptions {
                per_genre: 2,
                seed: Some(1),
            },
        )
        .unwrap();
        let out = dir.path().join("out/manifest.csv");
        write_manifest(&out, &manifest).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("path,genre"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn empty_manifest_still_has_header() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("m.csv");
        write_manifest(&out, &DatasetManifest::default()).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "path,genre");
    }
}
