//! Storage layer for media files.
//!
//! A single flat directory holds every media file. Files are addressed by
//! filename only; there is no database and no metadata sidecar.

pub mod root;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

use std::path::PathBuf;

pub use root::{StorageRoot, StoredFile, VIDEO_MIME_TYPE, validate_filename};

use crate::ErrorCode;

/// Errors that can occur while resolving or accessing stored files.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filename is empty, contains a path separator, or names a directory entry
    #[error("Invalid filename: {filename:?}")]
    FilenameInvalid {
        /// The rejected filename
        filename: String,
    },

    /// No regular file with this name exists under the storage root
    #[error("File not found: {filename}")]
    NotFound {
        /// Name that was looked up
        filename: String,
    },

    /// Underlying file system operation failed
    #[error("I/O error during {operation} on {}: {source}", path.display())]
    Io {
        /// Operation being performed
        operation: &'static str,
        /// Path the operation targeted
        path: PathBuf,
        /// Original I/O error
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Returns the failure class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            StorageError::FilenameInvalid { .. } => ErrorCode::InvalidRequest,
            StorageError::NotFound { .. } => ErrorCode::NotFound,
            StorageError::Io { .. } => ErrorCode::IoFailure,
        }
    }

    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        StorageError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
