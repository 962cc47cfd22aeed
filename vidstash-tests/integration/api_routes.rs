//! HTTP routes driven through the router without a listener

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::json;
use tower::ServiceExt;
use vidstash_core::StorageRoot;
use vidstash_core::storage::test_fixtures::{create_temp_storage_root, write_media_file};
use vidstash_core::transcode::TranscodeOperation;
use vidstash_web::{ERROR_CODE_HEADER, build_router};

use crate::support::{MAGNET, RecordingTranscoder, ScriptedSwarm, SwarmScript, test_state};

struct Harness {
    _temp_dir: tempfile::TempDir,
    root: StorageRoot,
    router: Router,
    swarm: Arc<ScriptedSwarm>,
    transcoder: Arc<RecordingTranscoder>,
}

fn harness(script: SwarmScript, swarm_timeout: Option<Duration>) -> Harness {
    let (temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(script);
    let transcoder = RecordingTranscoder::new(root.clone());
    let router = build_router(test_state(
        &root,
        swarm.clone(),
        swarm_timeout,
        transcoder.clone(),
    ));
    Harness {
        _temp_dir: temp_dir,
        root,
        router,
        swarm,
        transcoder,
    }
}

async fn get(router: &Router, uri: &str, range: Option<&str>) -> Response {
    let mut request = Request::get(uri);
    if let Some(range) = range {
        request = request.header(header::RANGE, range);
    }
    router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> Response {
    post_raw(router, uri, body.to_string()).await
}

async fn post_raw(router: &Router, uri: &str, body: String) -> Response {
    router
        .clone()
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_health() {
    let h = harness(SwarmScript::Hang, None);
    let response = get(&h.router, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "ok");
}

#[tokio::test]
async fn test_full_video_response_headers() {
    let h = harness(SwarmScript::Hang, None);
    let payload = write_media_file(&h.root, "movie.mp4", 1000);

    let response = get(&h.router, "/videos/movie.mp4", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
    assert!(response.headers().get(header::ACCEPT_RANGES).is_none());
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    assert_eq!(bytes(response).await, payload);
}

#[tokio::test]
async fn test_partial_video_response_headers() {
    let h = harness(SwarmScript::Hang, None);
    let payload = write_media_file(&h.root, "movie.mp4", 1000);

    let response = get(&h.router, "/videos/movie.mp4", Some("bytes=0-99")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/1000");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(bytes(response).await, &payload[..100]);

    let response = get(&h.router, "/videos/movie.mp4", Some("bytes=500-")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 500-999/1000");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "500");
    assert_eq!(bytes(response).await, &payload[500..]);
}

#[tokio::test]
async fn test_video_error_statuses() {
    let h = harness(SwarmScript::Hang, None);
    write_media_file(&h.root, "movie.mp4", 1000);

    let response = get(&h.router, "/videos/absent.mp4", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[ERROR_CODE_HEADER], "not_found");
    assert_eq!(text(response).await, "File not found");

    let response = get(&h.router, "/videos/movie.mp4", Some("bytes=abc-")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[ERROR_CODE_HEADER], "invalid_range");

    let response = get(&h.router, "/videos/movie.mp4", Some("bytes=1000-")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");

    let response = get(&h.router, "/videos/..%2Fmovie.mp4", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[ERROR_CODE_HEADER], "invalid_request");
}

#[tokio::test]
async fn test_download_url_validation() {
    let h = harness(SwarmScript::Hang, None);

    let response = post_json(
        &h.router,
        "/download/url",
        json!({ "url": "http://example.com/a.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "URL and filename are required");

    let response = post_raw(&h.router, "/download/url", "{not json".to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[ERROR_CODE_HEADER], "invalid_request");
}

#[tokio::test]
async fn test_download_url_success_then_serve() {
    let h = harness(SwarmScript::Hang, None);
    let upstream =
        axum::Router::new().route("/source.mp4", axum::routing::get(|| async { vec![7u8; 4096] }));
    let addr = crate::support::spawn_upstream(upstream).await;

    let response = post_json(
        &h.router,
        "/download/url",
        json!({ "url": format!("http://{addr}/source.mp4"), "filename": "copy.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Video downloaded successfully");

    let response = get(&h.router, "/videos/copy.mp4", Some("bytes=4000-")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(bytes(response).await, vec![7u8; 96]);
}

#[tokio::test]
async fn test_download_url_upstream_failure() {
    let h = harness(SwarmScript::Hang, None);
    let upstream = axum::Router::new();
    let addr = crate::support::spawn_upstream(upstream).await;

    let response = post_json(
        &h.router,
        "/download/url",
        json!({ "url": format!("http://{addr}/gone.mp4"), "filename": "gone.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[ERROR_CODE_HEADER], "upstream_failure");
}

#[tokio::test]
async fn test_download_torrent_success() {
    let h = harness(SwarmScript::Complete("Sintel"), None);

    let response =
        post_json(&h.router, "/download/torrent", json!({ "magnetLink": MAGNET })).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Downloaded: Sintel");
    assert_eq!(h.swarm.shutdown_count(), 1);
}

#[tokio::test]
async fn test_download_torrent_failures() {
    let h = harness(SwarmScript::Fail("no peers"), None);
    let response = post_json(&h.router, "/download/torrent", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Magnet link is required");

    let response =
        post_json(&h.router, "/download/torrent", json!({ "magnetLink": MAGNET })).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(response).await, "no peers");
    assert_eq!(h.swarm.shutdown_count(), 1);

    let h = harness(SwarmScript::Hang, Some(Duration::from_millis(50)));
    let response =
        post_json(&h.router, "/download/torrent", json!({ "magnetLink": MAGNET })).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.headers()[ERROR_CODE_HEADER], "timeout");
    assert_eq!(h.swarm.shutdown_count(), 1);
}

#[tokio::test]
async fn test_process_routes_build_jobs() {
    let h = harness(SwarmScript::Hang, None);
    write_media_file(&h.root, "in.mkv", 64);

    let response = post_json(
        &h.router,
        "/process/convert",
        json!({ "inputFilename": "in.mkv", "outputFilename": "out.mp4", "videoCodec": "libx265" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Converted in.mkv to out.mp4");

    let response = post_json(
        &h.router,
        "/process/compress",
        json!({ "inputFilename": "in.mkv", "outputFilename": "small.mp4", "crf": 30 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        &h.router,
        "/process/subtitles",
        json!({ "inputFilename": "in.mkv", "outputFilename": "subs.srt", "streamIndex": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Extracted subtitles from in.mkv to subs.srt");

    let operations: Vec<TranscodeOperation> = h
        .transcoder
        .recorded()
        .into_iter()
        .map(|job| job.operation)
        .collect();
    assert_eq!(
        operations,
        [
            TranscodeOperation::ChangeCodec {
                video_codec: "libx265".to_string(),
                audio_codec: None,
            },
            TranscodeOperation::Compress {
                crf: 30,
                preset: "medium".to_string(),
            },
            TranscodeOperation::ExtractSubtitles { stream_index: 1 },
        ]
    );
}

#[tokio::test]
async fn test_process_error_statuses() {
    let h = harness(SwarmScript::Hang, None);
    write_media_file(&h.root, "in.mkv", 64);

    let response = post_json(
        &h.router,
        "/process/compress",
        json!({ "inputFilename": "absent.mkv", "outputFilename": "out.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(
        &h.router,
        "/process/compress",
        json!({ "inputFilename": "in.mkv", "outputFilename": "in.mkv" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        &h.router,
        "/process/convert",
        json!({ "inputFilename": "in.mkv", "outputFilename": "out.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
