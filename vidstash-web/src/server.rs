//! HTTP server for Vidstash
//!
//! Wires the core components into one router and runs it on a TCP listener.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vidstash_core::config::VidstashConfig;
use vidstash_core::ingest::{RqbitClientFactory, SwarmIngestor, UrlIngestor};
use vidstash_core::storage::{StorageError, StorageRoot};
use vidstash_core::streaming::MediaServer;
use vidstash_core::transcode::{FfmpegTranscoder, Transcoder};

use crate::handlers::{
    download_torrent, download_url, health, process_compress, process_convert,
    process_subtitles, serve_video,
};

/// Errors that stop the server from starting or keep it from running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Listen address could not be parsed
    #[error("Invalid listen address {address}: {source}")]
    InvalidAddress {
        /// Address as configured
        address: String,
        /// Parse failure
        source: std::net::AddrParseError,
    },

    /// Outbound HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Storage root could not be prepared
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Binding or serving failed
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Components shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Directory holding every stored file
    pub storage: StorageRoot,
    /// Range-aware file server
    pub media: MediaServer,
    /// Direct HTTP(S) ingestion
    pub url_ingestor: UrlIngestor,
    /// Swarm ingestion
    pub swarm_ingestor: SwarmIngestor,
    /// External transcode gateway
    pub transcoder: Arc<dyn Transcoder>,
}

impl AppState {
    /// Builds production components from configuration.
    ///
    /// # Errors
    /// - `ServerError::HttpClient` - Outbound HTTP client could not be built
    pub fn from_config(config: &VidstashConfig) -> Result<Self, ServerError> {
        let storage = StorageRoot::new(config.storage.root.clone());
        let media = MediaServer::new(storage.clone(), &config.storage);
        let url_ingestor = UrlIngestor::new(
            storage.clone(),
            &config.ingest,
            config.storage.channel_capacity,
        )?;
        let swarm_ingestor = SwarmIngestor::new(
            storage.clone(),
            Arc::new(RqbitClientFactory),
            config.ingest.swarm_timeout,
        );
        let transcoder = Arc::new(FfmpegTranscoder::new(storage.clone(), &config.transcode));

        Ok(Self {
            storage,
            media,
            url_ingestor,
            swarm_ingestor,
            transcoder,
        })
    }
}

/// Builds the router with every route and the HTTP middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/videos/{filename}", get(serve_video))
        .route("/download/url", post(download_url))
        .route("/download/torrent", post(download_torrent))
        .route("/process/convert", post(process_convert))
        .route("/process/compress", post(process_compress))
        .route("/process/subtitles", post(process_subtitles))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the HTTP server until it fails.
///
/// The storage root is created if it does not exist yet.
///
/// # Errors
/// - `ServerError::InvalidAddress` - Host and port do not form a socket address
/// - `ServerError::Storage` - Storage root could not be created
/// - `ServerError::Io` - Listener could not bind or serving failed
pub async fn run_server(config: VidstashConfig) -> Result<(), ServerError> {
    let address = config
        .server
        .socket_addr()
        .map_err(|source| ServerError::InvalidAddress {
            address: format!("{}:{}", config.server.host, config.server.port),
            source,
        })?;

    let state = AppState::from_config(&config)?;
    state.storage.ensure_exists().await?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!(
        "Vidstash serving {} on http://{}",
        config.storage.root.display(),
        address
    );
    axum::serve(listener, app).await?;
    Ok(())
}
