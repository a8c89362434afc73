//! Fleet orchestration
//!
//! ```text
//! Idle ──start()──▶ Running ──deadline / interrupt──▶ Stopping ──▶ Stopped
//! ```
//!
//! `start` probes every configured server in roster order and spawns a
//! command and a stats collector for each reachable one. `stop` sends the
//! alert for the down servers (if any), stops every collector and collects
//! their counters into a [`RunReport`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::actors::CollectorHandle;
use crate::actors::messages::CollectorSummary;
use crate::alerts::AlertDispatcher;
use crate::config::Config;
use crate::mail::MailTransport;
use crate::probe::{FailureList, LivenessProbe};
use crate::protocol::RedisClient;
use crate::storage::{StorageBackend, ensure_healthy};

/// How long a stopping collector may take before it is aborted
const DEFAULT_COLLECTOR_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Deadline,
    Interrupt,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Deadline => write!(f, "deadline reached"),
            StopReason::Interrupt => write!(f, "interrupted"),
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub reason: StopReason,
    /// Servers that failed the liveness probe, in probe order
    pub failed: Vec<String>,
    pub collectors: Vec<CollectorSummary>,
    /// Row counts reported by the storage backend after the run
    pub storage: Option<String>,
}

pub struct FleetOrchestrator {
    config: Config,
    backend: Arc<dyn StorageBackend>,
    dispatcher: AlertDispatcher,
    probe: LivenessProbe,
    collectors: Vec<CollectorHandle>,
    state: RunState,
    grace: Duration,
}

impl FleetOrchestrator {
    pub fn new(
        config: Config,
        backend: Arc<dyn StorageBackend>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let probe = LivenessProbe::new(config.probe_timeout(), FailureList::new());
        let dispatcher = AlertDispatcher::new(config.mail.clone(), transport);

        Self {
            config,
            backend,
            dispatcher,
            probe,
            collectors: vec![],
            state: RunState::Idle,
            grace: DEFAULT_COLLECTOR_GRACE,
        }
    }

    /// Override how long stopping collectors are waited for
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn failures(&self) -> &FailureList {
        self.probe.failures()
    }

    pub fn collectors(&self) -> &[CollectorHandle] {
        &self.collectors
    }

    /// Probe every server in roster order; returns the reachable ones' clients
    #[instrument(skip(self))]
    pub async fn probe_fleet(&self) -> Vec<RedisClient> {
        let mut reachable = vec![];

        for server in &self.config.servers {
            if self.probe.probe(server).await {
                reachable.push(RedisClient::new(server.clone(), self.config.probe_timeout()));
            }
        }

        info!(
            "{} of {} server(s) reachable",
            reachable.len(),
            self.config.servers.len()
        );
        reachable
    }

    /// Probe the fleet once and alert on down servers without collecting
    pub async fn check_fleet(&self) -> Result<Vec<String>> {
        self.probe_fleet().await;

        let failed = self.probe.failures().snapshot();
        if !failed.is_empty() {
            self.dispatcher.dispatch(&failed).await?;
        }

        Ok(failed)
    }

    /// Idle → Running: probe and spawn two collectors per reachable server
    pub async fn start(&mut self) -> Result<()> {
        if self.state != RunState::Idle {
            bail!("cannot start a run in state {:?}", self.state);
        }

        ensure_healthy(self.backend.as_ref())
            .await
            .context("storage backend is not usable")?;

        for client in self.probe_fleet().await {
            debug!("spawning collectors for {}", client.server_id());

            self.collectors.push(CollectorHandle::spawn_command(
                client.clone(),
                self.backend.clone(),
            ));
            self.collectors.push(CollectorHandle::spawn_stats(
                client,
                self.backend.clone(),
                self.config.stats_interval(),
            ));
        }

        self.state = RunState::Running;
        Ok(())
    }

    /// Run until `duration` elapses or `interrupt` completes, then stop.
    ///
    /// Starts the run first if that has not happened yet.
    pub async fn run<F>(&mut self, duration: Duration, interrupt: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        match self.state {
            RunState::Idle => self.start().await?,
            RunState::Running => {}
            state => bail!("cannot run in state {state:?}"),
        }

        let reason = tokio::select! {
            _ = tokio::time::sleep(duration) => StopReason::Deadline,
            _ = interrupt => StopReason::Interrupt,
        };
        info!("{reason}, stopping {} collector(s)", self.collectors.len());

        self.stop(reason).await
    }

    /// Running → Stopping → Stopped
    ///
    /// Every collector is stopped even when the alert could not be sent;
    /// the transport error is returned afterwards.
    #[instrument(skip(self))]
    pub async fn stop(&mut self, reason: StopReason) -> Result<RunReport> {
        if self.state != RunState::Running {
            bail!("cannot stop a run in state {:?}", self.state);
        }
        self.state = RunState::Stopping;

        let failed = self.probe.failures().snapshot();
        let alert = if failed.is_empty() {
            Ok(())
        } else {
            self.dispatcher.dispatch(&failed).await
        };
        if let Err(e) = &alert {
            error!("failed to send alert: {e:#}");
        }

        for collector in &mut self.collectors {
            collector.stop().await;
        }

        let mut collectors = vec![];
        for collector in self.collectors.drain(..) {
            let summary = collector.join(self.grace).await;
            if summary.counts.failures() > 0 {
                warn!("{summary}");
            } else {
                debug!("{summary}");
            }
            collectors.push(summary);
        }

        let storage = match self.backend.get_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("failed to read storage stats: {e}");
                None
            }
        };

        self.state = RunState::Stopped;
        alert?;

        Ok(RunReport {
            reason,
            failed,
            collectors,
            storage,
        })
    }
}
