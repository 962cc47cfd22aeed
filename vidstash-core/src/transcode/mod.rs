//! External transcode gateway.
//!
//! Codec changes, compression and subtitle extraction are delegated to an
//! external transcoder that reads one stored file and writes another. The
//! gateway validates the request, runs the job and reports one outcome.

pub mod ffmpeg;

use std::time::Duration;

use async_trait::async_trait;

pub use ffmpeg::FfmpegTranscoder;

use crate::ErrorCode;
use crate::storage::StorageError;

/// Default constant rate factor for compression.
pub const DEFAULT_CRF: u8 = 28;
/// Highest constant rate factor accepted by x264.
pub const MAX_CRF: u8 = 51;
/// Default x264 speed preset for compression.
pub const DEFAULT_PRESET: &str = "medium";

const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// What the transcoder should do with the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOperation {
    /// Re-encode with the given codecs; audio is copied when `audio_codec` is `None`
    ChangeCodec {
        video_codec: String,
        audio_codec: Option<String>,
    },
    /// H.264 re-encode at the given quality
    Compress { crf: u8, preset: String },
    /// Extract one subtitle stream
    ExtractSubtitles { stream_index: u32 },
}

impl TranscodeOperation {
    /// Compression with optional overrides, falling back to the defaults.
    pub fn compress(crf: Option<u8>, preset: Option<String>) -> Self {
        TranscodeOperation::Compress {
            crf: crf.unwrap_or(DEFAULT_CRF),
            preset: preset.unwrap_or_else(|| DEFAULT_PRESET.to_string()),
        }
    }

    /// Short verb used in logs and confirmations.
    pub fn label(&self) -> &'static str {
        match self {
            TranscodeOperation::ChangeCodec { .. } => "convert",
            TranscodeOperation::Compress { .. } => "compress",
            TranscodeOperation::ExtractSubtitles { .. } => "extract subtitles",
        }
    }

    fn validate(&self) -> Result<(), TranscodeError> {
        match self {
            TranscodeOperation::ChangeCodec {
                video_codec,
                audio_codec,
            } => {
                validate_codec("video", video_codec)?;
                if let Some(audio_codec) = audio_codec {
                    validate_codec("audio", audio_codec)?;
                }
                Ok(())
            }
            TranscodeOperation::Compress { crf, preset } => {
                if *crf > MAX_CRF {
                    return Err(TranscodeError::invalid(format!(
                        "crf must be between 0 and {MAX_CRF}, got {crf}"
                    )));
                }
                if !X264_PRESETS.contains(&preset.as_str()) {
                    return Err(TranscodeError::invalid(format!("Unknown preset {preset:?}")));
                }
                Ok(())
            }
            TranscodeOperation::ExtractSubtitles { .. } => Ok(()),
        }
    }
}

fn validate_codec(kind: &str, codec: &str) -> Result<(), TranscodeError> {
    let well_formed = !codec.is_empty()
        && !codec.starts_with('-')
        && codec
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'));
    if well_formed {
        Ok(())
    } else {
        Err(TranscodeError::invalid(format!("Invalid {kind} codec {codec:?}")))
    }
}

/// One transcode request between two stored files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub input_filename: String,
    pub output_filename: String,
    pub operation: TranscodeOperation,
}

impl TranscodeJob {
    pub fn new(
        input_filename: impl Into<String>,
        output_filename: impl Into<String>,
        operation: TranscodeOperation,
    ) -> Self {
        Self {
            input_filename: input_filename.into(),
            output_filename: output_filename.into(),
            operation,
        }
    }

    /// Checks everything that can be checked without touching the disk.
    ///
    /// # Errors
    /// - `TranscodeError::InvalidRequest` - Missing names, identical names or bad parameters
    pub fn validate(&self) -> Result<(), TranscodeError> {
        if self.input_filename.is_empty() || self.output_filename.is_empty() {
            return Err(TranscodeError::invalid(
                "Input and output filenames are required",
            ));
        }
        if self.input_filename == self.output_filename {
            return Err(TranscodeError::invalid(
                "Input and output filenames must differ",
            ));
        }
        self.operation.validate()
    }
}

/// Completed transcode job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeReceipt {
    pub output_filename: String,
    pub size_bytes: u64,
    pub elapsed: Duration,
}

/// Errors reported by the transcode gateway.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("{reason}")]
    InvalidRequest { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transcoder could not run or exited unsuccessfully
    #[error("Transcode failed: {reason}")]
    Failed { reason: String },

    #[error("Transcode timed out after {}s", elapsed.as_secs())]
    TimedOut { elapsed: Duration },
}

impl TranscodeError {
    /// Returns the failure class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            TranscodeError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            TranscodeError::Storage(e) => e.code(),
            TranscodeError::Failed { .. } => ErrorCode::UpstreamFailure,
            TranscodeError::TimedOut { .. } => ErrorCode::Timeout,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        TranscodeError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        TranscodeError::Failed {
            reason: reason.into(),
        }
    }
}

/// Runs transcode jobs against the storage root.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Runs `job` to completion.
    ///
    /// # Errors
    /// - `TranscodeError::InvalidRequest` - Job failed validation
    /// - `TranscodeError::Storage` - Bad filename or missing input file
    /// - `TranscodeError::Failed` - Transcoder failed or produced no output
    /// - `TranscodeError::TimedOut` - Job exceeded the configured limit
    async fn transcode(&self, job: &TranscodeJob) -> Result<TranscodeReceipt, TranscodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(operation: TranscodeOperation) -> TranscodeJob {
        TranscodeJob::new("in.mkv", "out.mp4", operation)
    }

    #[test]
    fn test_compress_defaults() {
        assert_eq!(
            TranscodeOperation::compress(None, None),
            TranscodeOperation::Compress {
                crf: 28,
                preset: "medium".to_string()
            }
        );
    }

    #[test]
    fn test_job_validation() {
        let convert = TranscodeOperation::ChangeCodec {
            video_codec: "libx265".to_string(),
            audio_codec: None,
        };
        assert!(job(convert.clone()).validate().is_ok());

        let same = TranscodeJob::new("a.mp4", "a.mp4", convert.clone());
        assert!(matches!(same.validate(), Err(TranscodeError::InvalidRequest { .. })));

        let missing = TranscodeJob::new("", "a.mp4", convert);
        assert!(matches!(missing.validate(), Err(TranscodeError::InvalidRequest { .. })));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let bad = [
            TranscodeOperation::compress(Some(52), None),
            TranscodeOperation::compress(None, Some("warp".to_string())),
            TranscodeOperation::ChangeCodec {
                video_codec: "-f".to_string(),
                audio_codec: None,
            },
            TranscodeOperation::ChangeCodec {
                video_codec: "h264".to_string(),
                audio_codec: Some("a a c".to_string()),
            },
        ];
        for operation in bad {
            let err = job(operation).validate().unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRequest);
        }
    }
}
