//! Ingest a file over HTTP, then play it back with range requests

use axum::Router;
use axum::routing::get;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use serde_json::json;
use vidstash_core::storage::test_fixtures::{create_temp_storage_root, media_payload};
use vidstash_web::build_router;

use crate::support::{
    MAGNET, RecordingTranscoder, ScriptedSwarm, SwarmScript, spawn_upstream, test_state,
};

const SIZE: usize = 256 * 1024;

#[tokio::test]
async fn test_ingest_then_seek_through_file() {
    let (_temp_dir, root) = create_temp_storage_root();
    let origin = spawn_upstream(
        Router::new().route("/trailer.mp4", get(|| async { media_payload(SIZE) })),
    )
    .await;
    let server = spawn_upstream(build_router(test_state(
        &root,
        ScriptedSwarm::new(SwarmScript::Complete("Sintel")),
        None,
        RecordingTranscoder::new(root.clone()),
    )))
    .await;
    let client = reqwest::Client::new();
    let payload = media_payload(SIZE);

    let response = client
        .post(format!("http://{server}/download/url"))
        .json(&json!({ "url": format!("http://{origin}/trailer.mp4"), "filename": "trailer.mp4" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Video downloaded successfully");

    // Player probes the start, then seeks near the end.
    let response = client
        .get(format!("http://{server}/videos/trailer.mp4"))
        .header(RANGE, "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[ACCEPT_RANGES], "bytes");
    assert_eq!(
        response.headers()[CONTENT_RANGE],
        format!("bytes 0-{}/{SIZE}", SIZE - 1).as_str()
    );
    assert_eq!(response.bytes().await.unwrap(), &payload[..]);

    let seek = SIZE - 1000;
    let response = client
        .get(format!("http://{server}/videos/trailer.mp4"))
        .header(RANGE, format!("bytes={seek}-{}", SIZE + 5000))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[CONTENT_LENGTH], "1000");
    assert_eq!(response.bytes().await.unwrap(), &payload[seek..]);
}

#[tokio::test]
async fn test_torrent_route_over_socket() {
    let (_temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(SwarmScript::Complete("Sintel"));
    let server = spawn_upstream(build_router(test_state(
        &root,
        swarm.clone(),
        None,
        RecordingTranscoder::new(root.clone()),
    )))
    .await;

    let response = reqwest::Client::new()
        .post(format!("http://{server}/download/torrent"))
        .json(&json!({ "magnetLink": MAGNET }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Downloaded: Sintel");
    assert_eq!(swarm.shutdown_count(), 1);
}
