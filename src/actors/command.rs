//! CommandCollectorActor - follows a server's `MONITOR` stream
//!
//! ## Message Flow
//!
//! ```text
//! MONITOR line → parse_line → filter INFO/MONITOR → StorageBackend::save_monitor_command
//!     ↑
//!     └─── Commands (Shutdown), raced against the next line
//! ```
//!
//! A bad line (unparseable, failed write, unexpected reply) is logged and
//! counted; the stream keeps going. Only a closed connection ends the
//! actor early; there is no reconnect.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, trace, warn};

use super::messages::{CollectorCommand, CollectorStats};
use crate::parser::parse_line;
use crate::protocol::{MonitorConnection, RedisClient};
use crate::storage::StorageBackend;

/// Actor that stores every command a single server executes
pub struct CommandCollectorActor {
    client: RedisClient,

    server_id: String,

    backend: Arc<dyn StorageBackend>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<CollectorCommand>,

    stats: Arc<CollectorStats>,
}

impl CommandCollectorActor {
    pub fn new(
        client: RedisClient,
        backend: Arc<dyn StorageBackend>,
        command_rx: mpsc::Receiver<CollectorCommand>,
        stats: Arc<CollectorStats>,
    ) -> Self {
        Self {
            server_id: client.server_id(),
            client,
            backend,
            command_rx,
            stats,
        }
    }

    fn handle_command(command: Option<CollectorCommand>) -> ControlFlow<()> {
        match command {
            Some(CollectorCommand::PollNow { respond_to }) => {
                let _ = respond_to.send(Err(anyhow::anyhow!(
                    "command collectors follow the monitor stream and cannot be polled"
                )));
                ControlFlow::Continue(())
            }
            Some(CollectorCommand::Shutdown) => {
                debug!("received shutdown command");
                ControlFlow::Break(())
            }
            None => {
                warn!("command channel closed, shutting down");
                ControlFlow::Break(())
            }
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command arrives, the command channel closes,
    /// or the server closes the monitor connection.
    #[instrument(skip(self), fields(server = %self.server_id))]
    pub async fn run(mut self) {
        debug!("starting command collector");

        let open = MonitorConnection::open(&self.client);
        tokio::pin!(open);

        let mut monitor = loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => {
                    if Self::handle_command(command).is_break() {
                        debug!("stopped before the monitor stream was established");
                        return;
                    }
                }

                result = &mut open => match result {
                    Ok(monitor) => break monitor,
                    Err(e) => {
                        error!("failed to start monitor stream: {e}");
                        return;
                    }
                },
            }
        };

        let mut lines = monitor.lines();

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => {
                    if Self::handle_command(command).is_break() {
                        break;
                    }
                }

                line = lines.next() => match line {
                    Some(Ok(line)) => self.process_line(&line).await,
                    Some(Err(e)) => {
                        CollectorStats::incr(&self.stats.protocol_failures);
                        error!("error on monitor stream: {e}");
                    }
                    None => {
                        warn!("monitor stream closed by server");
                        break;
                    }
                },
            }
        }

        drop(lines);
        monitor.release();
        debug!("command collector stopped");
    }

    /// Parse one line and store the resulting event
    async fn process_line(&self, line: &str) {
        CollectorStats::incr(&self.stats.received);

        let event = match parse_line(line) {
            Ok(Some(event)) => event,
            Ok(None) => {
                CollectorStats::incr(&self.stats.skipped);
                trace!("skipping line without event: {line:?}");
                return;
            }
            Err(e) => {
                CollectorStats::incr(&self.stats.parse_failures);
                error!("discarding monitor line {line:?}: {e}");
                return;
            }
        };

        if event.is_ignored() {
            CollectorStats::incr(&self.stats.filtered);
            return;
        }

        let result = self
            .backend
            .save_monitor_command(
                &self.server_id,
                event.datetime(),
                &event.command,
                event.key.as_deref(),
                event.arguments.as_deref(),
            )
            .await;

        match result {
            Ok(()) => CollectorStats::incr(&self.stats.stored),
            Err(e) => {
                CollectorStats::incr(&self.stats.storage_failures);
                error!("failed to store {} command: {e}", event.command);
            }
        }
    }
}
