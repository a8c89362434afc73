//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked while collectors write
//! - **Connection pooling**: Concurrent collectors share a small pool
//! - **Migrations**: Schema versioning with sqlx
//!
//! Timestamps are stored as Unix microseconds, the resolution of the
//! `MONITOR` stream.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::info::{InfoSnapshot, MemorySample};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for concurrent writers (WAL mode, busy timeout)
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_micros(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_micros()
    }

    async fn count(&self, table: &str) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn save_monitor_command(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        command: &str,
        key: Option<&str>,
        arguments: Option<&str>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitor_commands (server_id, timestamp, command, key_name, arguments)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(server_id)
        .bind(Self::timestamp_to_micros(&timestamp))
        .bind(command)
        .bind(key)
        .bind(arguments)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_memory_info(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        memory: MemorySample,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO memory_info (server_id, timestamp, used_memory, peak_memory)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(server_id)
        .bind(Self::timestamp_to_micros(&timestamp))
        .bind(memory.used as i64)
        .bind(memory.peak as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_info_command(
        &self,
        server_id: &str,
        timestamp: DateTime<Utc>,
        info: &InfoSnapshot,
    ) -> StorageResult<()> {
        let info_json = serde_json::to_string(&info.fields)?;

        sqlx::query(
            r#"
            INSERT INTO info_commands (server_id, timestamp, info)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(server_id)
        .bind(Self::timestamp_to_micros(&timestamp))
        .bind(info_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: format!("SQLite database operational at {}", self.db_path),
            }),
            Err(e) => Ok(HealthStatus {
                healthy: false,
                message: format!("SQLite health check failed: {e}"),
            }),
        }
    }

    async fn get_stats(&self) -> StorageResult<String> {
        Ok(format!(
            "SQLite ({}): {} commands, {} memory samples, {} info snapshots",
            self.db_path,
            self.count("monitor_commands").await?,
            self.count("memory_info").await?,
            self.count("info_commands").await?
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
