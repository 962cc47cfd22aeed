//! Ingestion of new media files into the storage root.
//!
//! Two acquisition paths are supported: a direct streaming HTTP(S) fetch and
//! a swarm (torrent) download from a magnet reference. Both report exactly
//! one terminal outcome per call and never retry internally.

pub mod swarm;
pub mod url;

use std::time::Duration;

pub use swarm::{
    MagnetReference, RqbitClientFactory, SwarmClient, SwarmClientFactory, SwarmEvents,
    SwarmIngestor, SwarmReceipt, SwarmState,
};
pub use url::{IngestReceipt, IngestState, UrlIngestor};

use crate::ErrorCode;
use crate::storage::StorageError;

/// Errors that end an ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Caller input missing or malformed; nothing was attempted
    #[error("{reason}")]
    InvalidRequest { reason: String },

    /// Remote server or swarm reported a failure
    #[error("{reason}")]
    Upstream { reason: String },

    /// Writing the destination file failed
    #[error("Failed writing {filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Session exceeded its configured time budget
    #[error("Swarm download timed out after {}s", elapsed.as_secs())]
    TimedOut { elapsed: Duration },
}

impl IngestError {
    /// Returns the failure class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            IngestError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            IngestError::Upstream { .. } => ErrorCode::UpstreamFailure,
            IngestError::Io { .. } => ErrorCode::IoFailure,
            IngestError::Storage(e) => e.code(),
            IngestError::TimedOut { .. } => ErrorCode::Timeout,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        IngestError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn upstream(reason: impl Into<String>) -> Self {
        IngestError::Upstream {
            reason: reason.into(),
        }
    }
}
