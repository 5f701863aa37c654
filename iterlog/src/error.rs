//! Error taxonomy for iteration log operations.
//!
//! Single-record operations surface these directly. Batch operations (listing,
//! counting, cleanup) only return an error when the directory itself cannot be
//! read; per-entry problems are reported as anomalies instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type LogResult<T> = std::result::Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    /// No log file carries the requested iteration number.
    #[error("iteration log {iteration_number} not found")]
    NotFound { iteration_number: u32 },

    /// The file exists but its header or body could not be parsed.
    #[error("corrupt iteration log {}: {reason}", path.display())]
    CorruptLog { path: PathBuf, reason: String },

    /// A directory entry does not decode as an iteration log file name.
    #[error("malformed iteration log filename {file_name:?}")]
    MalformedFilename { file_name: String },

    #[error("create iterations directory {}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write iteration log {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("delete iteration log {}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LogError::NotFound { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, LogError::CorruptLog { .. })
    }
}
