//! Shared fixtures: local upstream servers, scripted swarms, fake transcoder

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use vidstash_core::config::{IngestConfig, StorageConfig};
use vidstash_core::ingest::{
    MagnetReference, SwarmClient, SwarmClientFactory, SwarmEvents, SwarmIngestor, UrlIngestor,
};
use vidstash_core::storage::StorageRoot;
use vidstash_core::streaming::MediaServer;
use vidstash_core::transcode::{
    TranscodeError, TranscodeJob, TranscodeReceipt, Transcoder,
};
use vidstash_web::AppState;

pub const MAGNET: &str =
    "magnet:?xt=urn:btih:08ada5a7a6183aae1e09d831df6748d566095a10&dn=Sintel";

/// Serves `router` on an ephemeral local port for the rest of the test.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// What a scripted swarm client reports after joining.
#[derive(Debug, Clone)]
pub enum SwarmScript {
    /// Metadata, then done with this name
    Complete(&'static str),
    /// Error with this reason
    Fail(&'static str),
    /// Done and error fired concurrently from two tasks
    Race,
    /// Never reports anything
    Hang,
}

struct ScriptedClient {
    script: SwarmScript,
    shutdowns: Arc<AtomicUsize>,
    parked: Option<SwarmEvents>,
}

#[async_trait]
impl SwarmClient for ScriptedClient {
    async fn join(&mut self, _magnet: &MagnetReference, _destination: &Path, events: SwarmEvents) {
        match self.script.clone() {
            SwarmScript::Complete(name) => {
                tokio::spawn(async move {
                    events.metadata(name);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    events.done(name);
                });
            }
            SwarmScript::Fail(reason) => {
                tokio::spawn(async move {
                    events.error(reason);
                });
            }
            SwarmScript::Race => {
                let other = events.clone();
                tokio::spawn(async move {
                    events.done("raced");
                });
                tokio::spawn(async move {
                    other.error("raced failure");
                });
            }
            SwarmScript::Hang => self.parked = Some(events),
        }
    }

    async fn shutdown(&mut self) {
        self.parked = None;
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out scripted clients and counting their teardowns.
pub struct ScriptedSwarm {
    script: SwarmScript,
    created: AtomicUsize,
    shutdowns: Arc<AtomicUsize>,
}

impl ScriptedSwarm {
    pub fn new(script: SwarmScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            created: AtomicUsize::new(0),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl SwarmClientFactory for ScriptedSwarm {
    fn create(&self) -> Box<dyn SwarmClient> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedClient {
            script: self.script.clone(),
            shutdowns: self.shutdowns.clone(),
            parked: None,
        })
    }
}

/// Transcoder that records jobs and writes a fixed payload as output.
pub struct RecordingTranscoder {
    jobs: Mutex<Vec<TranscodeJob>>,
    storage: StorageRoot,
}

impl RecordingTranscoder {
    pub fn new(storage: StorageRoot) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(Vec::new()),
            storage,
        })
    }

    pub fn recorded(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for RecordingTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<TranscodeReceipt, TranscodeError> {
        job.validate()?;
        self.jobs.lock().unwrap().push(job.clone());

        self.storage.stat(&job.input_filename).await?;
        let path = self.storage.resolve(&job.output_filename)?;
        std::fs::write(&path, b"out").unwrap();

        Ok(TranscodeReceipt {
            output_filename: job.output_filename.clone(),
            size_bytes: 3,
            elapsed: Duration::from_millis(1),
        })
    }
}

/// Application state over `root` with test doubles for swarm and transcoder.
pub fn test_state(
    root: &StorageRoot,
    swarm: Arc<ScriptedSwarm>,
    swarm_timeout: Option<Duration>,
    transcoder: Arc<RecordingTranscoder>,
) -> AppState {
    let storage_config = StorageConfig {
        root: root.path().to_path_buf(),
        read_chunk_size: 1024,
        channel_capacity: 4,
    };
    AppState {
        storage: root.clone(),
        media: MediaServer::new(root.clone(), &storage_config),
        url_ingestor: UrlIngestor::new(root.clone(), &IngestConfig::default(), 4).unwrap(),
        swarm_ingestor: SwarmIngestor::new(root.clone(), swarm, swarm_timeout),
        transcoder,
    }
}
