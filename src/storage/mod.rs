//! Storage backends for collected statistics
//!
//! The collectors only ever write: every monitored command, every memory
//! sample and every raw `INFO` snapshot goes through the
//! [`StorageBackend`] trait.
//!
//! ## Backends
//!
//! - **In-Memory** (default): rows kept in process, lost on exit
//! - **SQLite** (`storage-sqlite` feature): embedded database file
//!
//! ## Usage
//!
//! ```no_run
//! use redis_monitoring::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./redis-monitoring.db").await?;
//!     println!("{}", backend.get_stats().await?);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::StorageConfig;

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

/// Build the backend selected in the configuration
pub async fn open_backend(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory storage");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = sqlite::SqliteBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::InvalidConfig(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}

/// Fail unless the backend reports itself healthy
pub async fn ensure_healthy(backend: &dyn StorageBackend) -> StorageResult<()> {
    let status = backend.health_check().await?;
    if !status.healthy {
        return Err(StorageError::ConnectionFailed(status.message));
    }

    debug!("{}", status.message);
    Ok(())
}
