//! Swarm client backed by an embedded librqbit session

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use librqbit::{AddTorrent, AddTorrentOptions, Session, SessionOptions};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{MagnetReference, SwarmClient, SwarmClientFactory, SwarmEvents};

/// Builds a fresh [`RqbitSwarmClient`] for every session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqbitClientFactory;

impl SwarmClientFactory for RqbitClientFactory {
    fn create(&self) -> Box<dyn SwarmClient> {
        Box::new(RqbitSwarmClient::default())
    }
}

/// One librqbit session dedicated to a single magnet reference.
#[derive(Default)]
pub struct RqbitSwarmClient {
    session: Option<Arc<Session>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl SwarmClient for RqbitSwarmClient {
    async fn join(&mut self, magnet: &MagnetReference, destination: &Path, events: SwarmEvents) {
        let options = SessionOptions {
            disable_dht_persistence: true,
            ..Default::default()
        };
        let session = match Session::new_with_opts(destination.to_path_buf(), options).await {
            Ok(session) => session,
            Err(e) => {
                events.error(format!("Failed to start swarm session: {e:#}"));
                return;
            }
        };

        let uri = magnet.as_str().to_string();
        let output_folder = destination.to_string_lossy().into_owned();
        let task_session = session.clone();
        self.session = Some(session);

        self.task = Some(tokio::spawn(async move {
            let add_options = AddTorrentOptions {
                overwrite: true,
                output_folder: Some(output_folder),
                ..Default::default()
            };
            let response = match task_session
                .add_torrent(AddTorrent::Url(Cow::Owned(uri)), Some(add_options))
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    events.error(format!("Failed to add torrent: {e:#}"));
                    return;
                }
            };

            let Some(handle) = response.into_handle() else {
                events.error("Swarm session returned no torrent handle");
                return;
            };

            let name = handle
                .name()
                .unwrap_or_else(|| handle.info_hash().as_string());
            events.metadata(&name);

            match handle.wait_until_completed().await {
                Ok(()) => {
                    events.done(name);
                }
                Err(e) => {
                    events.error(format!("Torrent {name} failed: {e:#}"));
                }
            }
        }));
    }

    async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Swarm task ended abnormally: {}", e);
                }
            }
        }
        if let Some(session) = self.session.take() {
            session.stop().await;
            info!("Swarm session stopped");
        } else {
            debug!("Swarm client shut down before a session started");
        }
    }
}
