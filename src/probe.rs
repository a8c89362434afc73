//! Liveness probing of the fleet

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::ServerConfig;
use crate::protocol::{ProtocolError, RedisConnection};

/// Identities of servers that failed their liveness probe.
///
/// Ordered by first failure and free of duplicates. Cloning shares the
/// underlying list.
#[derive(Debug, Clone, Default)]
pub struct FailureList {
    inner: Arc<Mutex<Vec<String>>>,
}

impl FailureList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // a panicking writer cannot leave a half-pushed Vec behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append `server_id` unless it is already recorded
    pub fn record(&self, server_id: impl Into<String>) {
        let server_id = server_id.into();
        let mut failures = self.lock();
        if !failures.contains(&server_id) {
            failures.push(server_id);
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Short-lived connect + `PING` against a single server
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    timeout: Duration,
    failures: FailureList,
}

impl LivenessProbe {
    pub fn new(timeout: Duration, failures: FailureList) -> Self {
        Self { timeout, failures }
    }

    pub fn failures(&self) -> &FailureList {
        &self.failures
    }

    /// Returns whether the server answered `PONG`; records it as down otherwise
    #[instrument(skip_all, fields(server = %server))]
    pub async fn probe(&self, server: &ServerConfig) -> bool {
        match self.ping(server).await {
            Ok(()) => {
                debug!("server is up");
                true
            }
            Err(e) => {
                warn!("server is down: {e}");
                self.failures.record(server.id());
                false
            }
        }
    }

    async fn ping(&self, server: &ServerConfig) -> Result<(), ProtocolError> {
        let mut connection = RedisConnection::connect(server, self.timeout).await?;

        let result = tokio::time::timeout(self.timeout, connection.ping())
            .await
            .unwrap_or(Err(ProtocolError::Timeout));

        connection.close().await;
        result
    }
}
