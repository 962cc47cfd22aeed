//! Media serving handlers

use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use vidstash_core::ErrorCode;

use super::ApiError;
use crate::server::AppState;

/// `GET /videos/{filename}`: full or partial content of a stored file.
///
/// # Errors
/// Returns 400 for a bad filename or range syntax, 404 for a missing file
/// and 416 for a range outside the file.
pub async fn serve_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = match headers.get(header::RANGE) {
        Some(value) => Some(value.to_str().map_err(|_| {
            ApiError::new(ErrorCode::InvalidRange, "Range header is not valid ASCII")
        })?),
        None => None,
    };

    let media = state.media.serve(&filename, range).await?;
    Ok(media.into_response())
}

/// `GET /health`: liveness probe.
pub async fn health() -> &'static str {
    "ok"
}
