//! Failure tests for collectors and the orchestrator
//!
//! A single bad line, a failing sink or a vanished server must never take
//! down more than the affected iteration (or, for a closed stream, the
//! affected collector).

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use redis_monitoring::actors::CollectorHandle;
use redis_monitoring::protocol::RedisClient;
use redis_monitoring::storage::{MemoryBackend, StorageBackend};
use redis_monitoring::{FleetOrchestrator, RunState, StopReason};

use crate::helpers::*;

fn client_for(fake: &FakeRedis) -> RedisClient {
    RedisClient::new(fake.server_config(), Duration::from_secs(1))
}

#[tokio::test]
async fn test_sink_failures_are_counted_not_fatal() {
    let fake = FakeRedis::start().await;
    let mut handle = CollectorHandle::spawn_command(client_for(&fake), Arc::new(FailingBackend));

    fake.wait_for_monitors(1).await;
    for key in ["a", "b", "c"] {
        fake.push_line(&format!(r#"1577836800.0 [0 127.0.0.1:1] "SET" "{key}" "1""#));
    }
    wait_until(|| handle.counts().storage_failures == 3).await;
    assert!(handle.is_running());

    fake.push_line(r#"1577836801.0 [0 127.0.0.1:1] "GET" "a""#);
    wait_until(|| handle.counts().received == 4).await;

    handle.stop().await;
    let summary = handle.join(Duration::from_secs(2)).await;
    assert_eq!(summary.counts.stored, 0);
    assert_eq!(summary.counts.storage_failures, 4);
}

#[tokio::test]
async fn test_malformed_lines_do_not_stop_the_stream() {
    let fake = FakeRedis::start().await;
    let backend = Arc::new(MemoryBackend::new());
    let mut handle = CollectorHandle::spawn_command(client_for(&fake), backend.clone());

    fake.wait_for_monitors(1).await;
    fake.push_line("not-a-time \"SET\" \"k\"");
    fake.push_line("inf \"SET\" \"k\"");
    fake.push_line(r#"1577836800.0 [0 127.0.0.1:1]"#);
    fake.push_line(r#"1577836800.0 [0 127.0.0.1:1] "SET" "k" "v""#);

    wait_until(|| handle.counts().received == 4).await;
    handle.stop().await;
    let summary = handle.join(Duration::from_secs(2)).await;

    assert_eq!(summary.counts.parse_failures, 3);
    assert_eq!(summary.counts.stored, 1);
    assert_eq!(backend.commands().await[0].command, "SET");
}

#[tokio::test]
async fn test_stats_without_used_memory() {
    let fake = FakeRedis::with_options(FakeRedisOptions {
        info: "# Server\r\nredis_version:2.4.0\r\n".to_string(),
        ..Default::default()
    })
    .await;
    let backend = Arc::new(MemoryBackend::new());
    let mut handle =
        CollectorHandle::spawn_stats(client_for(&fake), backend.clone(), Duration::from_secs(60));

    assert!(handle.poll_now().await.is_err());
    assert!(handle.counts().parse_failures >= 1);
    assert!(handle.is_running());

    handle.stop().await;
    handle.join(Duration::from_secs(2)).await;
    assert!(backend.memory_samples().await.is_empty());
}

#[tokio::test]
async fn test_stats_sink_failure_reported_by_poll() {
    let fake = FakeRedis::start().await;
    let mut handle = CollectorHandle::spawn_stats(
        client_for(&fake),
        Arc::new(FailingBackend),
        Duration::from_secs(60),
    );

    let err = handle.poll_now().await.unwrap_err();
    assert!(err.to_string().contains("failed to store"), "{err:#}");
    assert!(handle.counts().storage_failures >= 2);

    handle.stop().await;
    handle.join(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_server_going_away_ends_command_collector() {
    let fake = FakeRedis::start().await;
    let backend = Arc::new(MemoryBackend::new());
    let handle = CollectorHandle::spawn_command(client_for(&fake), backend);

    fake.wait_for_monitors(1).await;
    fake.shutdown();

    wait_until(|| !handle.is_running()).await;
    assert!(!handle.stop_requested());

    let summary = handle.join(Duration::from_secs(1)).await;
    assert_eq!(summary.counts.protocol_failures, 1);
}

#[tokio::test]
async fn test_stats_collector_survives_server_restart_window() {
    let fake = FakeRedis::start().await;
    let backend = Arc::new(MemoryBackend::new());
    let mut handle =
        CollectorHandle::spawn_stats(client_for(&fake), backend, Duration::from_secs(60));

    handle.poll_now().await.unwrap();
    fake.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // the dead connection is dropped and reconnecting fails; the actor lives on
    assert!(handle.poll_now().await.is_err());
    assert!(handle.poll_now().await.is_err());
    assert!(handle.is_running());
    assert!(handle.counts().protocol_failures >= 2);

    handle.stop().await;
    handle.join(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_alert_failure_still_stops_collectors() {
    let fake = FakeRedis::start().await;

    let mut orchestrator = FleetOrchestrator::new(
        fleet_config(vec![unreachable_server(), fake.server_config()]),
        Arc::new(MemoryBackend::new()),
        Arc::new(FailingTransport),
    );

    orchestrator.start().await.unwrap();
    fake.wait_for_monitors(1).await;

    let result = orchestrator.run(Duration::from_secs(3600), async {}).await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "connection to relay refused");
    assert_eq!(orchestrator.state(), RunState::Stopped);
    assert!(orchestrator.collectors().is_empty());
    fake.wait_for_monitors_below(1).await;
}

#[tokio::test]
async fn test_run_with_failing_sink_still_reports() {
    let fake = FakeRedis::start().await;
    let backend: Arc<dyn StorageBackend> = Arc::new(FailingBackend);

    let mut orchestrator = FleetOrchestrator::new(
        fleet_config(vec![fake.server_config()]),
        backend,
        Arc::new(RecordingTransport::default()),
    );

    orchestrator.start().await.unwrap();
    fake.wait_for_monitors(1).await;
    fake.push_line(r#"1577836800.0 [0 127.0.0.1:1] "SET" "k" "v""#);
    wait_until(|| {
        orchestrator
            .collectors()
            .iter()
            .map(|c| c.counts().storage_failures)
            .sum::<u64>()
            >= 1
    })
    .await;

    let report = orchestrator.stop(StopReason::Interrupt).await.unwrap();
    let failures: u64 = report
        .collectors
        .iter()
        .map(|c| c.counts.storage_failures)
        .sum();
    assert!(failures >= 1);
    assert_matches!(report.reason, StopReason::Interrupt);
}
