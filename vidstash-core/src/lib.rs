//! Vidstash Core - Range-addressable media storage and ingestion
//!
//! This crate provides the building blocks of the Vidstash media server:
//! a flat storage root, HTTP range resolution and chunked file serving,
//! streaming URL ingestion, swarm (torrent) ingestion and the external
//! transcode gateway.

pub mod config;
pub mod ingest;
pub mod storage;
pub mod streaming;
pub mod tracing_setup;
pub mod transcode;

// Re-export main types for convenient access
pub use config::VidstashConfig;
pub use ingest::{IngestError, SwarmIngestor, UrlIngestor};
pub use storage::{StorageError, StorageRoot, StoredFile};
pub use streaming::{MediaServer, RangeError, StreamingError};
pub use transcode::{TranscodeError, TranscodeJob, TranscodeOperation, Transcoder};

/// Stable, machine-readable classification of a failure.
///
/// Carried next to the human-readable reason so clients can branch on the
/// failure class without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    NotFound,
    InvalidRange,
    RangeNotSatisfiable,
    IoFailure,
    UpstreamFailure,
    Timeout,
}

impl ErrorCode {
    /// Returns the wire representation of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::NotFound => "not_found",
            ErrorCode::InvalidRange => "invalid_range",
            ErrorCode::RangeNotSatisfiable => "range_not_satisfiable",
            ErrorCode::IoFailure => "io_failure",
            ErrorCode::UpstreamFailure => "upstream_failure",
            ErrorCode::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core errors that can bubble up from any Vidstash subsystem.
#[derive(Debug, thiserror::Error)]
pub enum VidstashError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VidstashError {
    /// Returns the failure class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            VidstashError::Storage(e) => e.code(),
            VidstashError::Streaming(e) => e.code(),
            VidstashError::Ingest(e) => e.code(),
            VidstashError::Transcode(e) => e.code(),
            VidstashError::Io(_) => ErrorCode::IoFailure,
        }
    }

    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            VidstashError::Storage(StorageError::NotFound { .. }) => "File not found".to_string(),
            VidstashError::Storage(StorageError::FilenameInvalid { filename }) => {
                format!("Invalid filename: {filename}")
            }
            VidstashError::Storage(_) => "Storage error occurred".to_string(),
            VidstashError::Streaming(e) => e.to_string(),
            VidstashError::Ingest(e) => e.to_string(),
            VidstashError::Transcode(e) => e.to_string(),
            VidstashError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::InvalidRequest
                | ErrorCode::NotFound
                | ErrorCode::InvalidRange
                | ErrorCode::RangeNotSatisfiable
        )
    }
}
