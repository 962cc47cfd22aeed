//! Ingestion handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;

use super::ApiError;
use crate::server::AppState;

/// Body of `POST /download/url`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UrlDownloadRequest {
    /// Remote resource to fetch
    pub url: String,
    /// Destination filename under the storage root
    pub filename: String,
}

/// Body of `POST /download/torrent`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TorrentDownloadRequest {
    /// Magnet URI of the swarm
    pub magnet_link: String,
}

/// `POST /download/url`: streams a remote resource into storage.
///
/// # Errors
/// Returns 400 for missing fields or a malformed body and 500 when the fetch
/// or the write fails.
pub async fn download_url(
    State(state): State<AppState>,
    payload: Result<Json<UrlDownloadRequest>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(request) = payload?;
    state
        .url_ingestor
        .ingest(&request.url, &request.filename)
        .await?;
    Ok("Video downloaded successfully")
}

/// `POST /download/torrent`: downloads swarm content into storage.
///
/// # Errors
/// Returns 400 for a missing or malformed magnet link, 500 when the swarm
/// fails and 504 when the configured timeout elapses.
pub async fn download_torrent(
    State(state): State<AppState>,
    payload: Result<Json<TorrentDownloadRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload?;
    let receipt = state.swarm_ingestor.ingest(&request.magnet_link).await?;
    Ok(format!("Downloaded: {}", receipt.name))
}
