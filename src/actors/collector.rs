//! Handles for spawned collector actors
//!
//! A [`CollectorHandle`] is the only owner of its actor: it can stop it,
//! wait for it, and read its counters. Handles are deliberately not
//! `Clone`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use super::command::CommandCollectorActor;
use super::messages::{
    CollectorCommand, CollectorCounts, CollectorKind, CollectorStats, CollectorSummary,
};
use super::stats::StatsCollectorActor;
use crate::protocol::RedisClient;
use crate::storage::StorageBackend;

/// Handle for controlling one collector actor
pub struct CollectorHandle {
    /// Command sender
    sender: mpsc::Sender<CollectorCommand>,

    /// Server ID (host:port)
    pub server_id: String,

    pub kind: CollectorKind,

    stats: Arc<CollectorStats>,

    task: JoinHandle<()>,

    stop_requested: bool,
}

impl CollectorHandle {
    /// Spawn a collector following the server's `MONITOR` stream
    pub fn spawn_command(client: RedisClient, backend: Arc<dyn StorageBackend>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let stats = Arc::new(CollectorStats::default());
        let server_id = client.server_id();

        let actor = CommandCollectorActor::new(client, backend, cmd_rx, stats.clone());

        Self {
            sender: cmd_tx,
            server_id,
            kind: CollectorKind::Command,
            stats,
            task: tokio::spawn(actor.run()),
            stop_requested: false,
        }
    }

    /// Spawn a collector polling `INFO` every `interval`
    pub fn spawn_stats(
        client: RedisClient,
        backend: Arc<dyn StorageBackend>,
        interval: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let stats = Arc::new(CollectorStats::default());
        let server_id = client.server_id();

        let actor = StatsCollectorActor::new(client, backend, cmd_rx, stats.clone(), interval);

        Self {
            sender: cmd_tx,
            server_id,
            kind: CollectorKind::Stats,
            stats,
            task: tokio::spawn(actor.run()),
            stop_requested: false,
        }
    }

    /// `host:port/kind`
    pub fn id(&self) -> String {
        format!("{}/{}", self.server_id, self.kind)
    }

    /// Whether the actor task is still alive
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn counts(&self) -> CollectorCounts {
        self.stats.snapshot()
    }

    /// Trigger an immediate collection cycle
    pub async fn poll_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CollectorCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    /// Ask the actor to stop. Idempotent; a finished actor is fine.
    pub async fn stop(&mut self) {
        if self.stop_requested {
            return;
        }
        self.stop_requested = true;

        if self.sender.send(CollectorCommand::Shutdown).await.is_err() {
            trace!("{} already stopped", self.id());
        }
    }

    /// Wait up to `grace` for the actor to finish, abort it otherwise
    pub async fn join(mut self, grace: Duration) -> CollectorSummary {
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => debug!("{} finished", self.id()),
            Ok(Err(e)) => error!("{} task failed: {e}", self.id()),
            Err(_) => {
                warn!("{} did not stop within {grace:?}, aborting", self.id());
                self.task.abort();
            }
        }

        CollectorSummary {
            server_id: self.server_id.clone(),
            kind: self.kind,
            counts: self.stats.snapshot(),
        }
    }
}
