//! Dataset tool errors.

use std::path::PathBuf;

use cadence_inference::PredictError;
use thiserror::Error;

/// Errors from crawling, cleaning, and trimming.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A required input path does not exist.
    #[error("{what} not found: {}", path.display())]
    NotFound {
        /// What the path was supposed to be.
        what: &'static str,
        /// The missing path.
        path: PathBuf,
    },

    /// Filesystem failure at `path`.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// Reading or writing the CSV manifest failed.
    #[error("manifest {}: {source}", path.display())]
    Csv {
        /// Manifest path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// The manifest header has no `path` column.
    #[error("manifest {} has no `path` column", path.display())]
    MissingPathColumn {
        /// Manifest path.
        path: PathBuf,
    },

    /// Two source clips map to the same output file.
    #[error("{} would overwrite the output of {}", path.display(), previous.display())]
    OutputCollision {
        /// Source clip that was skipped.
        path: PathBuf,
        /// Source clip that already wrote the output.
        previous: PathBuf,
    },

    /// A clip could not be decoded.
    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        /// Source clip.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: PredictError,
    },

    /// Writing a WAV file failed.
    #[error("cannot write {}: {source}", path.display())]
    Wav {
        /// Output path.
        path: PathBuf,
        /// Encoder error.
        #[source]
        source: hound::Error,
    },
}

/// Result alias for dataset tools.
pub type Result<T> = std::result::Result<T, DatasetError>;

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
