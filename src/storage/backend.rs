//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use crate::info::{InfoSnapshot, MemorySample};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,
}

/// Write side of the statistics store.
///
/// Collectors of every monitored server write through one shared backend,
/// so implementations must be `Send + Sync` and safe under concurrent
/// writes. Writes are fire-and-forget from the collector's point of view:
/// a failed write is logged and counted by the caller, never retried.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store one command seen on a monitor stream
    async fn save_monitor_command(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        command: &str,
        key: Option<&str>,
        arguments: Option<&str>,
    ) -> StorageResult<()>;

    /// Store one memory sample taken from `INFO`
    async fn save_memory_info(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        memory: MemorySample,
    ) -> StorageResult<()>;

    /// Store the complete `INFO` snapshot
    async fn save_info_command(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        info: &InfoSnapshot,
    ) -> StorageResult<()>;

    /// Check backend health
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human readable row counts
    async fn get_stats(&self) -> StorageResult<String>;

    /// Flush and release resources
    async fn close(&self) -> StorageResult<()>;
}
