//! StatsCollectorActor - polls `INFO` at a fixed interval
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → INFO → extract memory → save_memory_info + save_info_command
//!     ↑
//!     └─── Commands (PollNow, Shutdown)
//! ```
//!
//! The connection is opened lazily and dropped after a fatal error, so a
//! server that restarts is picked up again on a later tick.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, instrument, trace, warn};

use super::messages::{CollectorCommand, CollectorStats};
use crate::info::InfoSnapshot;
use crate::protocol::{ProtocolError, ProtocolResult, RedisClient, RedisConnection};
use crate::storage::StorageBackend;

/// Actor that samples statistics of a single server
pub struct StatsCollectorActor {
    client: RedisClient,

    server_id: String,

    backend: Arc<dyn StorageBackend>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<CollectorCommand>,

    stats: Arc<CollectorStats>,

    /// Time between two polls
    interval_duration: Duration,

    /// Upper bound for a single INFO round trip
    query_timeout: Duration,

    connection: Option<RedisConnection>,
}

impl StatsCollectorActor {
    pub fn new(
        client: RedisClient,
        backend: Arc<dyn StorageBackend>,
        command_rx: mpsc::Receiver<CollectorCommand>,
        stats: Arc<CollectorStats>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            server_id: client.server_id(),
            query_timeout: client.timeout(),
            client,
            backend,
            command_rx,
            stats,
            interval_duration,
            connection: None,
        }
    }

    /// Run the actor's main loop
    ///
    /// This runs until a Shutdown command is received or the command
    /// channel is closed.
    #[instrument(skip(self), fields(server = %self.server_id))]
    pub async fn run(mut self) {
        debug!("starting stats collector");

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => match command {
                    Some(CollectorCommand::PollNow { respond_to }) => {
                        debug!("received PollNow command");
                        let result = self.collect().await;
                        let _ = respond_to.send(result);
                    }

                    Some(CollectorCommand::Shutdown) => {
                        debug!("received shutdown command");
                        break;
                    }

                    None => {
                        warn!("command channel closed, shutting down");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    if let Err(e) = self.collect().await {
                        error!("failed to collect statistics: {:#}", e);
                    }
                }
            }
        }

        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }
        debug!("stats collector stopped");
    }

    /// One collection cycle
    async fn collect(&mut self) -> Result<()> {
        CollectorStats::incr(&self.stats.received);

        let raw = match self.query_info().await {
            Ok(raw) => raw,
            Err(e) => {
                CollectorStats::incr(&self.stats.protocol_failures);
                return Err(e).context("INFO query failed");
            }
        };
        let timestamp = Utc::now();

        let snapshot = InfoSnapshot::parse(&raw);
        let memory = snapshot
            .memory()
            .inspect_err(|_| CollectorStats::incr(&self.stats.parse_failures))?;
        trace!("used memory {} (peak {})", memory.used, memory.peak);

        let mut failures = vec![];

        match self
            .backend
            .save_memory_info(&self.server_id, timestamp, memory)
            .await
        {
            Ok(()) => CollectorStats::incr(&self.stats.stored),
            Err(e) => {
                CollectorStats::incr(&self.stats.storage_failures);
                failures.push(format!("memory sample: {e}"));
            }
        }

        match self
            .backend
            .save_info_command(&self.server_id, timestamp, &snapshot)
            .await
        {
            Ok(()) => CollectorStats::incr(&self.stats.stored),
            Err(e) => {
                CollectorStats::incr(&self.stats.storage_failures);
                failures.push(format!("info snapshot: {e}"));
            }
        }

        if !failures.is_empty() {
            anyhow::bail!("failed to store {}", failures.join(", "));
        }

        Ok(())
    }

    /// Issue `INFO`, (re)connecting first if needed
    async fn query_info(&mut self) -> ProtocolResult<String> {
        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => self.client.get_connection().await?,
        };

        let result = tokio::time::timeout(self.query_timeout, connection.info())
            .await
            .unwrap_or(Err(ProtocolError::Timeout));

        match result {
            Ok(raw) => {
                self.connection = Some(connection);
                Ok(raw)
            }
            Err(e) if e.is_fatal() => {
                debug!("dropping connection after {e}");
                Err(e)
            }
            Err(e) => {
                self.connection = Some(connection);
                Err(e)
            }
        }
    }
}
