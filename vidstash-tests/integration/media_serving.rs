//! Media serving against real files in an isolated storage root

use axum::body::to_bytes;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use vidstash_core::config::StorageConfig;
use vidstash_core::storage::StorageError;
use vidstash_core::storage::test_fixtures::{create_temp_storage_root, write_media_file};
use vidstash_core::streaming::{MediaServer, RangeError, StreamingError};

fn server(root: &vidstash_core::StorageRoot, chunk: usize) -> MediaServer {
    MediaServer::new(
        root.clone(),
        &StorageConfig {
            read_chunk_size: chunk,
            channel_capacity: 2,
            ..StorageConfig::default()
        },
    )
}

async fn body(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn test_large_file_streams_in_order_across_many_chunks() {
    let (_temp_dir, root) = create_temp_storage_root();
    let payload = write_media_file(&root, "long.mp4", 300_000);

    let response = server(&root, 4096)
        .serve("long.mp4", None)
        .await
        .unwrap()
        .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "300000");
    assert!(response.headers().get(header::ACCEPT_RANGES).is_none());
    assert_eq!(body(response).await, payload);
}

#[tokio::test]
async fn test_ranges_across_chunk_boundaries() {
    let (_temp_dir, root) = create_temp_storage_root();
    let payload = write_media_file(&root, "clip.mp4", 10_000);
    let media = server(&root, 333);

    for (header_value, start, end) in [
        ("bytes=0-0", 0usize, 0usize),
        ("bytes=332-334", 332, 334),
        ("bytes=9999-", 9999, 9999),
        ("bytes=5000-20000", 5000, 9999),
    ] {
        let response = media
            .serve("clip.mp4", Some(header_value))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            format!("bytes {start}-{end}/10000").as_str()
        );
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            (end - start + 1).to_string().as_str()
        );
        assert_eq!(body(response).await, &payload[start..=end]);
    }
}

#[tokio::test]
async fn test_missing_and_invalid_requests() {
    let (_temp_dir, root) = create_temp_storage_root();
    write_media_file(&root, "clip.mp4", 100);
    let media = server(&root, 64);

    assert!(matches!(
        media.serve("nope.mp4", None).await,
        Err(StreamingError::Storage(StorageError::NotFound { .. }))
    ));
    assert!(matches!(
        media.serve("../clip.mp4", None).await,
        Err(StreamingError::Storage(StorageError::FilenameInvalid { .. }))
    ));
    assert!(matches!(
        media.serve("clip.mp4", Some("bytes=100-")).await,
        Err(StreamingError::Range {
            total_size: 100,
            source: RangeError::NotSatisfiable { .. }
        })
    ));
    assert!(matches!(
        media.serve("clip.mp4", Some("items=0-1")).await,
        Err(StreamingError::Range {
            source: RangeError::InvalidRange { .. },
            ..
        })
    ));
}

#[tokio::test]
async fn test_concurrent_readers_get_independent_streams() {
    let (_temp_dir, root) = create_temp_storage_root();
    let payload = write_media_file(&root, "shared.mp4", 50_000);
    let media = server(&root, 1000);

    let mut tasks = Vec::new();
    for start in [0usize, 12_345, 40_000] {
        let media = media.clone();
        tasks.push(tokio::spawn(async move {
            let header_value = format!("bytes={start}-");
            let response = media
                .serve("shared.mp4", Some(&header_value))
                .await
                .unwrap()
                .into_response();
            (start, to_bytes(response.into_body(), usize::MAX).await.unwrap())
        }));
    }

    for task in tasks {
        let (start, bytes) = task.await.unwrap();
        assert_eq!(&bytes[..], &payload[start..]);
    }
}
