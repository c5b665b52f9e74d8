//! Error types for the dedup store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or persisting the sent set.
///
/// A missing file is not an error; it loads as an empty set.
#[derive(Debug, Error)]
pub enum DedupError {
    /// Reading, writing, or renaming the persisted list failed.
    #[error("IO error on sent list {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DedupError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
