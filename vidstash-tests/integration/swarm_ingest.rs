//! Swarm ingestion lifecycle with scripted swarm clients

use std::time::Duration;

use vidstash_core::ErrorCode;
use vidstash_core::ingest::{IngestError, SwarmIngestor};
use vidstash_core::storage::test_fixtures::create_temp_storage_root;

use crate::support::{MAGNET, ScriptedSwarm, SwarmScript};

#[tokio::test]
async fn test_completed_swarm_reports_name() {
    let (_temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(SwarmScript::Complete("Sintel"));

    let receipt = SwarmIngestor::new(root, swarm.clone(), None)
        .ingest(MAGNET)
        .await
        .unwrap();

    assert_eq!(receipt.name, "Sintel");
    assert_eq!(swarm.created_count(), 1);
    assert_eq!(swarm.shutdown_count(), 1);
}

#[tokio::test]
async fn test_swarm_error_is_reported_and_client_torn_down() {
    let (_temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(SwarmScript::Fail("tracker unreachable"));

    let err = SwarmIngestor::new(root, swarm.clone(), None)
        .ingest(MAGNET)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "tracker unreachable");
    assert_eq!(swarm.shutdown_count(), 1);
}

#[tokio::test]
async fn test_racing_done_and_error_settle_once() {
    for _ in 0..20 {
        let (_temp_dir, root) = create_temp_storage_root();
        let swarm = ScriptedSwarm::new(SwarmScript::Race);

        let outcome = SwarmIngestor::new(root, swarm.clone(), None)
            .ingest(MAGNET)
            .await;

        match outcome {
            Ok(receipt) => assert_eq!(receipt.name, "raced"),
            Err(IngestError::Upstream { reason }) => assert_eq!(reason, "raced failure"),
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(swarm.shutdown_count(), 1);
    }
}

#[tokio::test]
async fn test_timeout_tears_down_client() {
    let (_temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(SwarmScript::Hang);

    let err = SwarmIngestor::new(root, swarm.clone(), Some(Duration::from_millis(50)))
        .ingest(MAGNET)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Timeout);
    assert_eq!(swarm.shutdown_count(), 1);
}

#[tokio::test]
async fn test_abandoned_caller_still_tears_down() {
    let (_temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(SwarmScript::Complete("Sintel"));
    let ingestor = SwarmIngestor::new(root, swarm.clone(), None);

    let abandoned = tokio::time::timeout(Duration::from_millis(1), ingestor.ingest(MAGNET)).await;
    assert!(abandoned.is_err());

    for _ in 0..100 {
        if swarm.shutdown_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(swarm.shutdown_count(), 1);
}

#[tokio::test]
async fn test_concurrent_sessions_get_separate_clients() {
    let (_temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(SwarmScript::Complete("Sintel"));
    let ingestor = SwarmIngestor::new(root, swarm.clone(), None);

    let (a, b) = tokio::join!(ingestor.ingest(MAGNET), ingestor.ingest(MAGNET));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(swarm.created_count(), 2);
    assert_eq!(swarm.shutdown_count(), 2);
}

#[tokio::test]
async fn test_missing_magnet_creates_no_client() {
    let (_temp_dir, root) = create_temp_storage_root();
    let swarm = ScriptedSwarm::new(SwarmScript::Complete("Sintel"));

    let err = SwarmIngestor::new(root, swarm.clone(), None)
        .ingest("")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Magnet link is required");
    assert_eq!(swarm.created_count(), 0);
}
