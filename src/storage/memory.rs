//! In-memory storage backend (no persistence)
//!
//! Used when no storage is configured and throughout the tests. Rows are
//! kept behind a `RwLock`, so any number of collectors can write at once.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::info::{InfoSnapshot, MemorySample};

/// A stored monitor command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRow {
    pub server_id: String,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub key: Option<String>,
    pub arguments: Option<String>,
}

/// A stored memory sample
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    pub server_id: String,
    pub timestamp: DateTime<Utc>,
    pub memory: MemorySample,
}

/// A stored `INFO` snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct InfoRow {
    pub server_id: String,
    pub timestamp: DateTime<Utc>,
    pub info: InfoSnapshot,
}

#[derive(Debug, Default)]
struct Tables {
    commands: Vec<CommandRow>,
    memory: Vec<MemoryRow>,
    info: Vec<InfoRow>,
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
    closed: AtomicBool,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn commands(&self) -> Vec<CommandRow> {
        self.tables.read().await.commands.clone()
    }

    pub async fn commands_for(&self, server_id: &str) -> Vec<CommandRow> {
        self.tables
            .read()
            .await
            .commands
            .iter()
            .filter(|row| row.server_id == server_id)
            .cloned()
            .collect()
    }

    pub async fn memory_samples(&self) -> Vec<MemoryRow> {
        self.tables.read().await.memory.clone()
    }

    pub async fn info_snapshots(&self) -> Vec<InfoRow> {
        self.tables.read().await.info.clone()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn save_monitor_command(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        command: &str,
        key: Option<&str>,
        arguments: Option<&str>,
    ) -> StorageResult<()> {
        self.ensure_open()?;
        self.tables.write().await.commands.push(CommandRow {
            server_id: server_id.to_string(),
            timestamp,
            command: command.to_string(),
            key: key.map(str::to_string),
            arguments: arguments.map(str::to_string),
        });
        Ok(())
    }

    async fn save_memory_info(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        memory: MemorySample,
    ) -> StorageResult<()> {
        self.ensure_open()?;
        self.tables.write().await.memory.push(MemoryRow {
            server_id: server_id.to_string(),
            timestamp,
            memory,
        });
        Ok(())
    }

    async fn save_info_command(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        info: &InfoSnapshot,
    ) -> StorageResult<()> {
        self.ensure_open()?;
        self.tables.write().await.info.push(InfoRow {
            server_id: server_id.to_string(),
            timestamp,
            info: info.clone(),
        });
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let healthy = self.ensure_open().is_ok();
        Ok(HealthStatus {
            healthy,
            message: if healthy {
                "In-memory storage operational".to_string()
            } else {
                "In-memory storage closed".to_string()
            },
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let tables = self.tables.read().await;
        Ok(format!(
            "In-Memory: {} commands, {} memory samples, {} info snapshots",
            tables.commands.len(),
            tables.memory.len(),
            tables.info.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend");
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
