//! Streaming ingestion from a direct HTTP(S) URL

use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::IngestError;
use crate::config::IngestConfig;
use crate::storage::{StorageRoot, validate_filename};
use crate::streaming::pipe::{ChunkReceiver, DrainError, drain_to_writer};

/// Lifecycle of one URL ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Fetching,
    Succeeded,
    Failed,
}

/// Proof of a completed URL ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub filename: String,
    pub bytes_written: u64,
}

/// Transient record of one in-flight ingestion.
///
/// `finish` consumes the session, so a terminal outcome is produced once.
#[derive(Debug)]
struct IngestionSession {
    id: Uuid,
    source_url: reqwest::Url,
    destination_filename: String,
    state: IngestState,
}

impl IngestionSession {
    fn start(source_url: reqwest::Url, destination_filename: &str) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            source_url,
            destination_filename: destination_filename.to_string(),
            state: IngestState::Fetching,
        };
        info!(
            session = %session.id,
            "Fetching {} into {}",
            session.source_url, session.destination_filename
        );
        session
    }

    fn finish(mut self, result: Result<u64, IngestError>) -> Result<IngestReceipt, IngestError> {
        match result {
            Ok(bytes_written) => {
                self.state = IngestState::Succeeded;
                info!(
                    session = %self.id,
                    state = ?self.state,
                    "Stored {} ({} bytes)",
                    self.destination_filename, bytes_written
                );
                Ok(IngestReceipt {
                    filename: self.destination_filename,
                    bytes_written,
                })
            }
            Err(e) => {
                self.state = IngestState::Failed;
                error!(
                    session = %self.id,
                    state = ?self.state,
                    "Failed to ingest {} from {}: {}",
                    self.destination_filename, self.source_url, e
                );
                Err(e)
            }
        }
    }
}

/// Streams remote resources straight into the storage root.
#[derive(Debug, Clone)]
pub struct UrlIngestor {
    client: Client,
    storage: StorageRoot,
    channel_capacity: usize,
}

impl UrlIngestor {
    /// Creates an ingestor with its own HTTP client.
    ///
    /// # Errors
    /// - `reqwest::Error` - HTTP client could not be initialised
    pub fn new(
        storage: StorageRoot,
        config: &IngestConfig,
        channel_capacity: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self::with_client(client, storage, channel_capacity))
    }

    /// Creates an ingestor around an existing HTTP client.
    pub fn with_client(client: Client, storage: StorageRoot, channel_capacity: usize) -> Self {
        Self {
            client,
            storage,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Downloads `source_url` into `destination_filename`.
    ///
    /// Bytes are written in arrival order while the body is still downloading.
    /// An existing file of the same name is overwritten. On failure a
    /// partially written file is left in place.
    ///
    /// # Errors
    /// - `IngestError::InvalidRequest` - Missing URL or filename, bad URL, or bad filename
    /// - `IngestError::Upstream` - Request failed, non-success status, or body interrupted
    /// - `IngestError::Storage` - Destination could not be created
    /// - `IngestError::Io` - Writing or syncing the destination failed
    pub async fn ingest(
        &self,
        source_url: &str,
        destination_filename: &str,
    ) -> Result<IngestReceipt, IngestError> {
        let source_url = source_url.trim();
        if source_url.is_empty() || destination_filename.trim().is_empty() {
            return Err(IngestError::invalid("URL and filename are required"));
        }
        let url = parse_source_url(source_url)?;
        validate_filename(destination_filename).map_err(|_| {
            IngestError::invalid(format!("Invalid filename: {destination_filename:?}"))
        })?;

        let session = IngestionSession::start(url.clone(), destination_filename);
        let result = self.fetch_into(url, destination_filename).await;
        session.finish(result)
    }

    async fn fetch_into(&self, url: reqwest::Url, filename: &str) -> Result<u64, IngestError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| IngestError::upstream(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::upstream(format!(
                "{url} responded with {status}"
            )));
        }
        if let Some(length) = response.content_length() {
            info!("Upstream announced {} bytes for {}", length, filename);
        }

        let (mut file, _path) = self.storage.create(filename).await?;
        let receiver = spawn_response_reader(response, self.channel_capacity);

        let written = match drain_to_writer(receiver, &mut file).await {
            Ok(written) => written,
            Err(DrainError::Source(e)) => {
                warn!("Leaving partial file {} in place", filename);
                return Err(IngestError::upstream(format!(
                    "Download from {url} interrupted: {e}"
                )));
            }
            Err(DrainError::Sink(source)) => {
                return Err(IngestError::Io {
                    filename: filename.to_string(),
                    source,
                });
            }
        };

        file.sync_all().await.map_err(|source| IngestError::Io {
            filename: filename.to_string(),
            source,
        })?;

        Ok(written)
    }
}

fn parse_source_url(raw: &str) -> Result<reqwest::Url, IngestError> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| IngestError::invalid(format!("Invalid URL {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(IngestError::invalid(format!(
            "Unsupported URL scheme {scheme:?}, expected http or https"
        ))),
    }
}

/// Spawns the network side of the pipe: response chunks in arrival order.
fn spawn_response_reader(
    mut response: reqwest::Response,
    capacity: usize,
) -> ChunkReceiver<reqwest::Error> {
    let (sender, receiver) = mpsc::channel(capacity);

    tokio::spawn(async move {
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if sender.send(Ok(chunk)).await.is_err() {
                        // Writer gave up; dropping the response closes the connection.
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    let _ = sender.send(Err(e)).await;
                    return;
                }
            }
        }
    });

    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use crate::storage::test_fixtures::create_temp_storage_root;

    fn ingestor(root: &StorageRoot) -> UrlIngestor {
        UrlIngestor::new(root.clone(), &IngestConfig::default(), 4).unwrap()
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_without_io() {
        let (_temp_dir, root) = create_temp_storage_root();
        let ingestor = ingestor(&root);

        for (url, filename) in [
            ("", "a.mp4"),
            ("http://example.com/a.mp4", ""),
            ("  ", "a.mp4"),
            ("http://127.0.0.1:9/a.mp4", "   "),
        ] {
            let err = ingestor.ingest(url, filename).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRequest);
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_scheme_rejected() {
        let (_temp_dir, root) = create_temp_storage_root();

        let err = ingestor(&root)
            .ingest("ftp://example.com/a.mp4", "a.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_traversal_filename_rejected() {
        let (_temp_dir, root) = create_temp_storage_root();

        let err = ingestor(&root)
            .ingest("http://example.com/a.mp4", "../escape.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_upstream_failure() {
        let (_temp_dir, root) = create_temp_storage_root();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ingestor(&root)
            .ingest(&format!("http://{addr}/a.mp4"), "a.mp4")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamFailure);
    }
}
