//! Transcode gateway handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use vidstash_core::transcode::{TranscodeJob, TranscodeOperation};

use super::ApiError;
use crate::server::AppState;

/// Body of `POST /process/convert`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertRequest {
    /// Stored file to read
    pub input_filename: String,
    /// Stored file to write
    pub output_filename: String,
    /// Target video codec
    pub video_codec: String,
    /// Target audio codec; audio is copied when absent
    pub audio_codec: Option<String>,
}

/// Body of `POST /process/compress`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressRequest {
    /// Stored file to read
    pub input_filename: String,
    /// Stored file to write
    pub output_filename: String,
    /// Constant rate factor, 0 to 51
    pub crf: Option<u8>,
    /// x264 speed preset
    pub preset: Option<String>,
}

/// Body of `POST /process/subtitles`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubtitlesRequest {
    /// Stored file to read
    pub input_filename: String,
    /// Stored file to write
    pub output_filename: String,
    /// Index among the input's subtitle streams
    pub stream_index: Option<u32>,
}

/// `POST /process/convert`: re-encodes a stored file with other codecs.
///
/// # Errors
/// Returns 400 for invalid parameters, 404 for a missing input and 500 when
/// the transcoder fails.
pub async fn process_convert(
    State(state): State<AppState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload?;
    let job = TranscodeJob::new(
        request.input_filename,
        request.output_filename,
        TranscodeOperation::ChangeCodec {
            video_codec: request.video_codec,
            audio_codec: request.audio_codec,
        },
    );
    run(&state, job, "Converted").await
}

/// `POST /process/compress`: re-encodes a stored file as H.264.
///
/// # Errors
/// Returns 400 for invalid parameters, 404 for a missing input and 500 when
/// the transcoder fails.
pub async fn process_compress(
    State(state): State<AppState>,
    payload: Result<Json<CompressRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload?;
    let job = TranscodeJob::new(
        request.input_filename,
        request.output_filename,
        TranscodeOperation::compress(request.crf, request.preset),
    );
    run(&state, job, "Compressed").await
}

/// `POST /process/subtitles`: extracts one subtitle stream.
///
/// # Errors
/// Returns 400 for invalid parameters, 404 for a missing input and 500 when
/// the transcoder fails.
pub async fn process_subtitles(
    State(state): State<AppState>,
    payload: Result<Json<SubtitlesRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload?;
    let job = TranscodeJob::new(
        request.input_filename,
        request.output_filename,
        TranscodeOperation::ExtractSubtitles {
            stream_index: request.stream_index.unwrap_or(0),
        },
    );
    run(&state, job, "Extracted subtitles from").await
}

async fn run(state: &AppState, job: TranscodeJob, verb: &str) -> Result<String, ApiError> {
    let receipt = state.transcoder.transcode(&job).await?;
    Ok(format!(
        "{verb} {} to {}",
        job.input_filename, receipt.output_filename
    ))
}
