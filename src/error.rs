//! Error types for payload reading and hash library loading

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain the payload of a ROM file
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive contains no files")]
    EmptyArchive,

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("read timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("read task failed: {0}")]
    Task(String),
}

impl From<zip::result::ZipError> for ReadError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => ReadError::Io(io),
            other => ReadError::CorruptArchive(other.to_string()),
        }
    }
}

/// Failure while loading or merging hash library sources
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("hash library directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("no usable hash library files in {0}")]
    NoUsableSources(PathBuf),

    #[error("malformed hash library file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LibraryError {
    /// Whether the error must abort the run before any file is touched
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LibraryError::MissingDirectory(_) | LibraryError::NoUsableSources(_)
        )
    }
}
