//! Delete audio files that a manifest did not keep.

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::crawl::audio_files;
use crate::errors::{DatasetError, Result};

/// Prompt shown before deleting anything.
pub const CONFIRM_PROMPT: &str = "Are you sure you want to continue? (y/N)";

/// Files to delete under one directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanPlan {
    /// Directory that was scanned.
    pub dir: PathBuf,
    /// Audio files absent from the manifest, sorted.
    pub to_delete: Vec<PathBuf>,
    /// Audio files the manifest keeps.
    pub kept: usize,
}

/// The `path` column of a manifest CSV, canonicalized where possible.
pub fn read_manifest(path: &Path) -> Result<HashSet<PathBuf>> {
    if !path.is_file() {
        return Err(DatasetError::NotFound {
            what: "manifest",
            path: path.to_path_buf(),
        });
    }
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let column = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.trim() == "path")
        .ok_or_else(|| DatasetError::MissingPathColumn {
            path: path.to_path_buf(),
        })?;

    let mut keep = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if let Some(value) = record.get(column).map(str::trim).filter(|v| !v.is_empty()) {
            let _ = keep.insert(canonical(Path::new(value)));
        }
    }
    Ok(keep)
}

/// List audio files under `dir` that are not in `keep`.
pub fn plan_clean(dir: &Path, keep: &HashSet<PathBuf>) -> Result<CleanPlan> {
    if !dir.is_dir() {
        return Err(DatasetError::NotFound {
            what: "directory",
            path: dir.to_path_buf(),
        });
    }

    let files = audio_files(dir)?;
    let total = files.len();
    let to_delete: Vec<PathBuf> = files
        .into_iter()
        .filter(|f| !keep.contains(&canonical(f)))
        .collect();

    Ok(CleanPlan {
        dir: dir.to_path_buf(),
        kept: total - to_delete.len(),
        to_delete,
    })
}

/// Delete every file in `plan`. Returns how many were removed.
///
/// A file that cannot be removed is logged and skipped.
pub fn execute_clean(plan: &CleanPlan) -> usize {
    let mut removed = 0;
    for path in &plan.to_delete {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "delete failed"),
        }
    }
    info!(
        dir = %plan.dir.display(),
        removed,
        kept = plan.kept,
        "clean finished"
    );
    removed
}

/// Write `prompt` to `output` and read one line from `input`.
///
/// Only `y` or `Y` confirms. End of input cancels.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool> {
    write!(output, "{prompt} ")?;
    output.flush()?;
    let mut answer = String::new();
    let _ = input.read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y"))
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
