//! Media server: full and partial content delivery of stored files

use std::io;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};

use super::StreamingError;
use super::pipe::{ChunkReceiver, receiver_stream, spawn_file_reader};
use super::range::{RangeResolution, RangeSpec, resolve};
use crate::config::StorageConfig;
use crate::storage::{StorageRoot, StoredFile};

/// Serves stored files with HTTP range support.
#[derive(Debug, Clone)]
pub struct MediaServer {
    storage: StorageRoot,
    read_chunk_size: usize,
    channel_capacity: usize,
}

impl MediaServer {
    /// Creates a media server reading from `storage`.
    pub fn new(storage: StorageRoot, config: &StorageConfig) -> Self {
        Self {
            storage,
            read_chunk_size: config.read_chunk_size,
            channel_capacity: config.channel_capacity,
        }
    }

    /// Prepares a response for `filename`, honouring an optional `Range` header.
    ///
    /// The file is stat'ed before anything is opened, so a missing file never
    /// costs a file handle. On success the body is produced lazily, one
    /// bounded chunk at a time.
    ///
    /// # Errors
    /// - `StreamingError::Storage` - Filename invalid, file missing, or open failed
    /// - `StreamingError::Range` - Range header malformed or not satisfiable
    pub async fn serve(
        &self,
        filename: &str,
        range_header: Option<&str>,
    ) -> Result<MediaResponse, StreamingError> {
        let file = self.storage.stat(filename).await?;
        let resolution = resolve(range_header, file.size_bytes).map_err(|source| {
            StreamingError::Range {
                total_size: file.size_bytes,
                source,
            }
        })?;

        let (start, length) = match resolution {
            RangeResolution::NoRange => (0, file.size_bytes),
            RangeResolution::Partial(spec) => (spec.start, spec.chunk_size()),
        };

        let chunks = if length > 0 {
            let handle = self.storage.open(&file).await?;
            Some(spawn_file_reader(
                handle,
                start,
                length,
                self.read_chunk_size,
                self.channel_capacity,
            ))
        } else {
            None
        };

        match resolution {
            RangeResolution::NoRange => info!(
                "Serving {} in full ({} bytes)",
                file.filename, file.size_bytes
            ),
            RangeResolution::Partial(spec) => info!(
                "Serving {} range {}",
                file.filename,
                spec.content_range()
            ),
        }

        Ok(MediaResponse {
            file,
            range: match resolution {
                RangeResolution::NoRange => None,
                RangeResolution::Partial(spec) => Some(spec),
            },
            chunks,
        })
    }
}

/// A prepared full (200) or partial (206) media response.
///
/// Headers are fixed at construction; the body streams from disk when the
/// response is converted with [`IntoResponse`].
pub struct MediaResponse {
    file: StoredFile,
    range: Option<RangeSpec>,
    chunks: Option<ChunkReceiver<io::Error>>,
}

impl MediaResponse {
    /// File being served.
    pub fn file(&self) -> &StoredFile {
        &self.file
    }

    /// Interval being served, if this is a partial response.
    pub fn range(&self) -> Option<RangeSpec> {
        self.range
    }

    /// 206 for partial responses, 200 otherwise.
    pub fn status(&self) -> StatusCode {
        if self.range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        }
    }

    /// Number of body bytes that will be sent.
    pub fn content_length(&self) -> u64 {
        self.range
            .map_or(self.file.size_bytes, |spec| spec.chunk_size())
    }
}

impl std::fmt::Debug for MediaResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResponse")
            .field("file", &self.file)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

impl IntoResponse for MediaResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let content_length = self.content_length();
        let mime = self.file.mime_hint();

        let body = match self.chunks {
            Some(chunks) => Body::from_stream(receiver_stream(chunks)),
            None => Body::empty(),
        };

        let mut response = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, HeaderValue::from_static(mime))
            .header(header::CONTENT_LENGTH, content_length);

        if let Some(spec) = self.range {
            response = response
                .header(header::CONTENT_RANGE, spec.content_range())
                .header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }

        debug!("Media response {} with {} body bytes", status, content_length);

        response
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use crate::storage::test_fixtures::{create_temp_storage_root, write_media_file};
    use crate::streaming::RangeError;

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn server(root: &StorageRoot) -> MediaServer {
        MediaServer::new(
            root.clone(),
            &StorageConfig {
                read_chunk_size: 256,
                ..StorageConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_full_content_response() {
        let (_temp_dir, root) = create_temp_storage_root();
        let payload = write_media_file(&root, "full.mp4", 1000);

        let media = server(&root).serve("full.mp4", None).await.unwrap();
        assert_eq!(media.status(), StatusCode::OK);
        assert_eq!(media.content_length(), 1000);

        let response = media.into_response();
        let headers = response.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[header::CONTENT_LENGTH], "1000");
        assert!(headers.get(header::ACCEPT_RANGES).is_none());
        assert!(headers.get(header::CONTENT_RANGE).is_none());
        assert_eq!(body_bytes(response).await, payload);
    }

    #[tokio::test]
    async fn test_partial_content_response() {
        let (_temp_dir, root) = create_temp_storage_root();
        let payload = write_media_file(&root, "part.mp4", 1000);

        let response = server(&root)
            .serve("part.mp4", Some("bytes=0-99"))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers().clone();
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(headers[header::CONTENT_LENGTH], "100");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(body_bytes(response).await, payload[..100]);
    }

    #[tokio::test]
    async fn test_open_ended_range_response() {
        let (_temp_dir, root) = create_temp_storage_root();
        let payload = write_media_file(&root, "tail.mp4", 1000);

        let media = server(&root).serve("tail.mp4", Some("bytes=500-")).await.unwrap();
        assert_eq!(media.range().map(|spec| spec.end), Some(999));
        assert_eq!(media.content_length(), 500);

        let body = body_bytes(media.into_response()).await;
        assert_eq!(body, payload[500..]);
    }

    #[tokio::test]
    async fn test_empty_file_served_in_full() {
        let (_temp_dir, root) = create_temp_storage_root();
        write_media_file(&root, "empty.mp4", 0);

        let media = server(&root).serve("empty.mp4", Some("bytes=0-")).await.unwrap();
        assert_eq!(media.status(), StatusCode::OK);
        assert_eq!(media.content_length(), 0);
        assert!(body_bytes(media.into_response()).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_not_found() {
        let (_temp_dir, root) = create_temp_storage_root();

        let err = server(&root).serve("ghost.mp4", None).await.unwrap_err();
        assert!(matches!(
            err,
            StreamingError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_carries_size() {
        let (_temp_dir, root) = create_temp_storage_root();
        write_media_file(&root, "small.mp4", 10);

        let err = server(&root)
            .serve("small.mp4", Some("bytes=10-"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StreamingError::Range {
                total_size: 10,
                source: RangeError::NotSatisfiable { .. }
            }
        ));
    }
}
