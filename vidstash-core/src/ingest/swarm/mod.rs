//! Swarm (torrent) ingestion from magnet references.
//!
//! Each call owns exactly one swarm client. The client reports through
//! [`SwarmEvents`]; whichever terminal event arrives first decides the
//! outcome, later ones are ignored. The client is shut down exactly once on
//! every exit path, including when the caller stops waiting.

pub mod magnet;
pub mod rqbit;
pub mod settlement;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use magnet::MagnetReference;
pub use rqbit::{RqbitClientFactory, RqbitSwarmClient};
use settlement::Settlement;

use super::IngestError;
use crate::storage::StorageRoot;

/// Lifecycle of one swarm session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwarmState {
    Joining,
    Downloading,
    Succeeded,
    Failed,
}

impl SwarmState {
    fn is_terminal(self) -> bool {
        matches!(self, SwarmState::Succeeded | SwarmState::Failed)
    }
}

/// Proof of a completed swarm download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmReceipt {
    /// Content name advertised by the swarm
    pub name: String,
}

type SwarmOutcome = Result<String, String>;

struct SessionShared {
    session_id: Uuid,
    state: Mutex<SwarmState>,
    settlement: Settlement<SwarmOutcome>,
}

impl SessionShared {
    /// Marks a session that nobody waits on anymore as failed.
    fn abandon(&self) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = SwarmState::Failed;
        }
    }
}

/// Event sink handed to a [`SwarmClient`] for one session.
///
/// Cheap to clone and safe to use from any task. Dropping every clone
/// without a terminal event fails the session.
#[derive(Clone)]
pub struct SwarmEvents {
    shared: Arc<SessionShared>,
}

impl SwarmEvents {
    fn new(session_id: Uuid) -> (Self, oneshot::Receiver<SwarmOutcome>) {
        let (settlement, receiver) = Settlement::new();
        let events = Self {
            shared: Arc::new(SessionShared {
                session_id,
                state: Mutex::new(SwarmState::Joining),
                settlement,
            }),
        };
        (events, receiver)
    }

    /// Current session state.
    pub fn state(&self) -> SwarmState {
        *self.shared.state.lock()
    }

    /// Swarm metadata resolved; content download has started.
    pub fn metadata(&self, name: &str) {
        let mut state = self.shared.state.lock();
        if *state == SwarmState::Joining {
            *state = SwarmState::Downloading;
            info!(session = %self.shared.session_id, "Downloading {}", name);
        }
    }

    /// Terminal event: all content is on disk. Returns whether it settled the session.
    pub fn done(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        debug!(session = %self.shared.session_id, "Swarm reported done: {}", name);
        self.settle(Ok(name), SwarmState::Succeeded)
    }

    /// Terminal event: the swarm failed. Returns whether it settled the session.
    pub fn error(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        debug!(session = %self.shared.session_id, "Swarm reported error: {}", reason);
        self.settle(Err(reason), SwarmState::Failed)
    }

    fn settle(&self, outcome: SwarmOutcome, terminal: SwarmState) -> bool {
        let mut state = self.shared.state.lock();
        if state.is_terminal() {
            debug!(
                session = %self.shared.session_id,
                "Ignoring {:?} event, session already {:?}",
                terminal, *state
            );
            return false;
        }
        if !self.shared.settlement.settle(outcome) {
            *state = SwarmState::Failed;
            debug!(
                session = %self.shared.session_id,
                "Ignoring {:?} event, session was abandoned",
                terminal
            );
            return false;
        }
        *state = terminal;
        true
    }
}

/// A swarm client scoped to one session.
#[async_trait]
pub trait SwarmClient: Send {
    /// Joins the swarm for `magnet` and starts downloading into `destination`.
    ///
    /// Outcomes, including failures to join, are reported through `events`,
    /// possibly from background tasks after this returns.
    async fn join(&mut self, magnet: &MagnetReference, destination: &Path, events: SwarmEvents);

    /// Releases every resource held by the client.
    async fn shutdown(&mut self);
}

/// Creates one fresh [`SwarmClient`] per session.
pub trait SwarmClientFactory: Send + Sync {
    fn create(&self) -> Box<dyn SwarmClient>;
}

/// Downloads swarm content into the storage root.
#[derive(Clone)]
pub struct SwarmIngestor {
    storage: StorageRoot,
    factory: Arc<dyn SwarmClientFactory>,
    timeout: Option<Duration>,
}

impl SwarmIngestor {
    /// Creates an ingestor. `timeout` of `None` waits for the swarm indefinitely.
    pub fn new(
        storage: StorageRoot,
        factory: Arc<dyn SwarmClientFactory>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            storage,
            factory,
            timeout,
        }
    }

    /// Downloads everything referenced by `magnet_reference`.
    ///
    /// The session runs on its own task, so teardown happens even if the
    /// returned future is dropped.
    ///
    /// # Errors
    /// - `IngestError::InvalidRequest` - Missing or malformed magnet reference
    /// - `IngestError::Upstream` - Swarm reported an error or closed without an outcome
    /// - `IngestError::TimedOut` - Configured timeout elapsed first
    pub async fn ingest(&self, magnet_reference: &str) -> Result<SwarmReceipt, IngestError> {
        let magnet = MagnetReference::parse(magnet_reference)?;

        let session = SwarmSession {
            id: Uuid::new_v4(),
            magnet,
            destination: self.storage.path().to_path_buf(),
            client: self.factory.create(),
            timeout: self.timeout,
        };

        tokio::spawn(session.run())
            .await
            .map_err(|e| IngestError::upstream(format!("Swarm session aborted: {e}")))?
    }
}

struct SwarmSession {
    id: Uuid,
    magnet: MagnetReference,
    destination: PathBuf,
    client: Box<dyn SwarmClient>,
    timeout: Option<Duration>,
}

impl SwarmSession {
    async fn run(mut self) -> Result<SwarmReceipt, IngestError> {
        info!(
            session = %self.id,
            "Joining swarm {} into {}",
            self.magnet,
            self.destination.display()
        );

        let (events, outcome) = SwarmEvents::new(self.id);
        let watch: Weak<SessionShared> = Arc::downgrade(&events.shared);
        self.client.join(&self.magnet, &self.destination, events).await;

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, outcome).await {
                Ok(received) => Self::interpret(received),
                Err(_) => {
                    if let Some(shared) = watch.upgrade() {
                        shared.abandon();
                    }
                    Err(IngestError::TimedOut { elapsed: limit })
                }
            },
            None => Self::interpret(outcome.await),
        };

        self.client.shutdown().await;

        match &result {
            Ok(receipt) => info!(session = %self.id, "Swarm download complete: {}", receipt.name),
            Err(IngestError::TimedOut { .. }) => {
                warn!(session = %self.id, "Swarm download for {} timed out", self.magnet)
            }
            Err(e) => error!(session = %self.id, "Swarm download failed: {}", e),
        }
        result
    }

    fn interpret(
        received: Result<SwarmOutcome, oneshot::error::RecvError>,
    ) -> Result<SwarmReceipt, IngestError> {
        match received {
            Ok(Ok(name)) => Ok(SwarmReceipt { name }),
            Ok(Err(reason)) => Err(IngestError::upstream(reason)),
            Err(_) => Err(IngestError::upstream(
                "Swarm client closed without reporting an outcome",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ErrorCode;
    use crate::storage::test_fixtures::create_temp_storage_root;

    const MAGNET: &str = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&dn=clip";

    #[derive(Clone, Copy)]
    enum Script {
        Done,
        Error,
        DoneThenError,
        RacingBoth,
        Silent,
        DropEvents,
        LateDone,
    }

    type LateReport = Arc<Mutex<Option<(bool, SwarmState)>>>;

    struct ScriptedClient {
        script: Script,
        shutdowns: Arc<AtomicUsize>,
        held: Option<SwarmEvents>,
        late: LateReport,
    }

    #[async_trait]
    impl SwarmClient for ScriptedClient {
        async fn join(
            &mut self,
            _magnet: &MagnetReference,
            destination: &Path,
            events: SwarmEvents,
        ) {
            assert!(destination.is_dir());
            events.metadata("clip");
            match self.script {
                Script::Done => {
                    events.done("clip");
                }
                Script::Error => {
                    events.error("no peers");
                }
                Script::DoneThenError => {
                    assert!(events.done("clip"));
                    assert!(!events.error("late failure"));
                    assert_eq!(events.state(), SwarmState::Succeeded);
                }
                Script::RacingBoth => {
                    let a = events.clone();
                    let b = events.clone();
                    let done = tokio::spawn(async move { a.done("clip") });
                    let error = tokio::spawn(async move { b.error("boom") });
                    let fired = [done.await.unwrap(), error.await.unwrap()];
                    assert_eq!(fired.iter().filter(|fired| **fired).count(), 1);
                }
                Script::Silent => self.held = Some(events),
                Script::DropEvents => drop(events),
                Script::LateDone => {
                    let late = self.late.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        let settled = events.done("clip");
                        *late.lock() = Some((settled, events.state()));
                    });
                }
            }
        }

        async fn shutdown(&mut self) {
            self.held = None;
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedFactory {
        script: Script,
        created: AtomicUsize,
        shutdowns: Arc<AtomicUsize>,
        late: LateReport,
    }

    impl ScriptedFactory {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                created: AtomicUsize::new(0),
                shutdowns: Arc::new(AtomicUsize::new(0)),
                late: Arc::new(Mutex::new(None)),
            })
        }
    }

    impl SwarmClientFactory for ScriptedFactory {
        fn create(&self) -> Box<dyn SwarmClient> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Box::new(ScriptedClient {
                script: self.script,
                shutdowns: self.shutdowns.clone(),
                held: None,
                late: self.late.clone(),
            })
        }
    }

    fn ingestor(
        root: &StorageRoot,
        factory: Arc<ScriptedFactory>,
        timeout: Option<Duration>,
    ) -> SwarmIngestor {
        SwarmIngestor::new(root.clone(), factory, timeout)
    }

    #[tokio::test]
    async fn test_done_reports_name_and_tears_down() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::Done);

        let receipt = ingestor(&root, factory.clone(), None)
            .ingest(MAGNET)
            .await
            .unwrap();

        assert_eq!(receipt.name, "clip");
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_reports_failure_and_tears_down() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::Error);

        let err = ingestor(&root, factory.clone(), None)
            .ingest(MAGNET)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Upstream { ref reason } if reason == "no peers"));
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_error_after_done_is_ignored() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::DoneThenError);

        let receipt = ingestor(&root, factory.clone(), None)
            .ingest(MAGNET)
            .await
            .unwrap();

        assert_eq!(receipt.name, "clip");
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_racing_terminal_events_fire_once() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::RacingBoth);

        let result = ingestor(&root, factory.clone(), None)
            .ingest(MAGNET)
            .await;

        match result {
            Ok(receipt) => assert_eq!(receipt.name, "clip"),
            Err(IngestError::Upstream { reason }) => assert_eq!(reason, "boom"),
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_events_fail_session() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::DropEvents);

        let err = ingestor(&root, factory.clone(), None)
            .ingest(MAGNET)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::UpstreamFailure);
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_fails_and_tears_down() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::Silent);

        let err = ingestor(&root, factory.clone(), Some(Duration::from_millis(50)))
            .ingest(MAGNET)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::TimedOut { .. }));
        assert_eq!(err.code(), ErrorCode::Timeout);
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_done_after_timeout_leaves_session_failed() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::LateDone);

        let err = ingestor(&root, factory.clone(), Some(Duration::from_millis(50)))
            .ingest(MAGNET)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::TimedOut { .. }));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*factory.late.lock(), Some((false, SwarmState::Failed)));
    }

    #[test]
    fn test_abandoned_session_is_failed() {
        let (events, outcome) = SwarmEvents::new(Uuid::new_v4());
        events.metadata("clip");
        drop(outcome);

        events.shared.abandon();
        assert_eq!(events.state(), SwarmState::Failed);
        assert!(!events.done("clip"));
        assert_eq!(events.state(), SwarmState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_magnet_creates_no_client() {
        let (_temp_dir, root) = create_temp_storage_root();
        let factory = ScriptedFactory::new(Script::Done);

        for raw in ["", "not-a-magnet"] {
            let err = ingestor(&root, factory.clone(), None)
                .ingest(raw)
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRequest);
        }
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }
}
