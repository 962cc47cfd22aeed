//! URL ingestion against a local upstream server

use std::io;

use axum::Router;
use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::get;
use vidstash_core::ErrorCode;
use vidstash_core::config::IngestConfig;
use vidstash_core::ingest::{IngestError, UrlIngestor};
use vidstash_core::storage::test_fixtures::{create_temp_storage_root, media_payload};

use crate::support::spawn_upstream;

const PAYLOAD_SIZE: usize = 10 * 1024;

fn upstream() -> Router {
    Router::new()
        .route("/clip.mp4", get(|| async { media_payload(PAYLOAD_SIZE) }))
        .route(
            "/chunked.mp4",
            get(|| async {
                let chunks = media_payload(PAYLOAD_SIZE)
                    .chunks(1000)
                    .map(|chunk| Ok::<_, io::Error>(chunk.to_vec()))
                    .collect::<Vec<_>>();
                Body::from_stream(futures::stream::iter(chunks))
            }),
        )
        .route(
            "/broken.mp4",
            get(|| async {
                let chunks = vec![
                    Ok(vec![1u8; 1000]),
                    Err(io::Error::other("upstream reset")),
                ];
                Body::from_stream(futures::stream::iter(chunks))
            }),
        )
        .route("/missing.mp4", get(|| async { StatusCode::NOT_FOUND }))
}

fn ingestor(root: &vidstash_core::StorageRoot) -> UrlIngestor {
    UrlIngestor::new(root.clone(), &IngestConfig::default(), 2).unwrap()
}

#[tokio::test]
async fn test_reachable_resource_is_stored_byte_identical() {
    let (temp_dir, root) = create_temp_storage_root();
    let addr = spawn_upstream(upstream()).await;

    let receipt = ingestor(&root)
        .ingest(&format!("http://{addr}/clip.mp4"), "a.mp4")
        .await
        .unwrap();

    assert_eq!(receipt.filename, "a.mp4");
    assert_eq!(receipt.bytes_written, PAYLOAD_SIZE as u64);
    assert_eq!(
        std::fs::read(temp_dir.path().join("a.mp4")).unwrap(),
        media_payload(PAYLOAD_SIZE)
    );
}

#[tokio::test]
async fn test_chunked_body_written_in_arrival_order() {
    let (temp_dir, root) = create_temp_storage_root();
    let addr = spawn_upstream(upstream()).await;

    ingestor(&root)
        .ingest(&format!("http://{addr}/chunked.mp4"), "b.mp4")
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(temp_dir.path().join("b.mp4")).unwrap(),
        media_payload(PAYLOAD_SIZE)
    );
}

#[tokio::test]
async fn test_existing_file_is_overwritten() {
    let (temp_dir, root) = create_temp_storage_root();
    std::fs::write(temp_dir.path().join("a.mp4"), vec![9u8; PAYLOAD_SIZE * 2]).unwrap();
    let addr = spawn_upstream(upstream()).await;

    ingestor(&root)
        .ingest(&format!("http://{addr}/clip.mp4"), "a.mp4")
        .await
        .unwrap();

    assert_eq!(
        std::fs::metadata(temp_dir.path().join("a.mp4")).unwrap().len(),
        PAYLOAD_SIZE as u64
    );
}

#[tokio::test]
async fn test_non_success_status_fails_once_without_file() {
    let (temp_dir, root) = create_temp_storage_root();
    let addr = spawn_upstream(upstream()).await;

    let err = ingestor(&root)
        .ingest(&format!("http://{addr}/missing.mp4"), "a.mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Upstream { .. }));
    assert!(err.to_string().contains("404"));
    assert!(!temp_dir.path().join("a.mp4").exists());
}

#[tokio::test]
async fn test_interrupted_body_is_upstream_failure() {
    let (_temp_dir, root) = create_temp_storage_root();
    let addr = spawn_upstream(upstream()).await;

    let err = ingestor(&root)
        .ingest(&format!("http://{addr}/broken.mp4"), "c.mp4")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::UpstreamFailure);
}
