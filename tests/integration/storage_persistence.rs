//! Collectors writing into a SQLite file

use std::sync::Arc;
use std::time::Duration;

use redis_monitoring::FleetOrchestrator;
use redis_monitoring::config::StorageConfig;
use redis_monitoring::storage::open_backend;
use tempfile::TempDir;

use crate::helpers::*;

#[tokio::test]
async fn test_run_persists_to_sqlite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fleet.db");
    let fake = FakeRedis::start().await;

    let backend = open_backend(&StorageConfig::Sqlite { path: path.clone() })
        .await
        .unwrap();

    let mut orchestrator = FleetOrchestrator::new(
        fleet_config(vec![fake.server_config()]),
        backend.clone(),
        Arc::new(RecordingTransport::default()),
    );

    orchestrator.start().await.unwrap();
    fake.wait_for_monitors(1).await;
    fake.push_line(r#"1577836800.0 [0 127.0.0.1:1] "SET" "k" "v""#);
    fake.push_line(r#"1577836800.1 [0 127.0.0.1:1] "HGET" "h" "f""#);
    wait_until(|| {
        orchestrator
            .collectors()
            .iter()
            .all(|c| c.counts().stored >= 2)
    })
    .await;

    let report = orchestrator
        .run(Duration::from_secs(3600), async {})
        .await
        .unwrap();
    assert!(report.collectors.iter().all(|c| c.counts.failures() == 0));
    backend.close().await.unwrap();

    // reopen the file to read what was flushed
    let reopened = open_backend(&StorageConfig::Sqlite { path }).await.unwrap();
    let stats = reopened.get_stats().await.unwrap();
    assert!(stats.contains("2 commands"), "unexpected stats: {stats}");
    assert!(!stats.contains(" 0 memory samples"), "unexpected stats: {stats}");
}

#[tokio::test]
async fn test_default_storage_is_in_memory() {
    let backend = open_backend(&StorageConfig::default()).await.unwrap();

    let health = backend.health_check().await.unwrap();
    assert!(health.healthy);
}
