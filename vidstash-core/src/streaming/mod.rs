//! Media streaming: range resolution, chunked file reads, responses

pub mod media;
pub mod pipe;
pub mod range;

pub use media::{MediaResponse, MediaServer};
pub use range::{RangeError, RangeResolution, RangeSpec};

use crate::ErrorCode;
use crate::storage::StorageError;

/// Errors that prevent a media response from being prepared.
///
/// Failures after the response headers are sent are not represented here;
/// they terminate the body stream instead.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{source}")]
    Range {
        /// Size of the file the range was resolved against
        total_size: u64,
        source: RangeError,
    },
}

impl StreamingError {
    /// Returns the failure class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            StreamingError::Storage(e) => e.code(),
            StreamingError::Range { source, .. } => source.code(),
        }
    }
}
