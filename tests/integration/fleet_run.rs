//! Liveness probing, alerting and full orchestrated runs

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use redis_monitoring::actors::messages::CollectorKind;
use redis_monitoring::config::ServerConfig;
use redis_monitoring::probe::{FailureList, LivenessProbe};
use redis_monitoring::storage::MemoryBackend;
use redis_monitoring::{FleetOrchestrator, RunState, StopReason};
use tokio::net::TcpListener;

use crate::helpers::*;

/// Two distinct local ports that were free a moment ago
async fn closed_ports() -> (u16, u16) {
    let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    (a.local_addr().unwrap().port(), b.local_addr().unwrap().port())
}

fn probe() -> (LivenessProbe, FailureList) {
    let failures = FailureList::new();
    (
        LivenessProbe::new(Duration::from_secs(1), failures.clone()),
        failures,
    )
}

#[tokio::test]
async fn test_probe_reachable_server() {
    let fake = FakeRedis::start().await;
    let (probe, failures) = probe();

    assert!(probe.probe(&fake.server_config()).await);
    assert!(failures.is_empty());
}

#[tokio::test]
async fn test_probe_unexpected_ping_reply() {
    let fake = FakeRedis::with_options(FakeRedisOptions {
        ping_reply: "LOADING".to_string(),
        ..Default::default()
    })
    .await;
    let (probe, failures) = probe();

    assert!(!probe.probe(&fake.server_config()).await);
    assert_eq!(failures.snapshot(), vec![fake.server_id()]);
}

#[tokio::test]
async fn test_probe_authentication() {
    let fake = FakeRedis::with_options(FakeRedisOptions {
        password: Some("hunter2".to_string()),
        ..Default::default()
    })
    .await;
    let (probe, failures) = probe();

    assert!(!probe.probe(&fake.server_config()).await);
    assert!(!probe.probe(&fake.server_config().with_password("wrong")).await);
    assert!(probe.probe(&fake.server_config().with_password("hunter2")).await);

    // same identity, recorded once
    assert_eq!(failures.snapshot(), vec![fake.server_id()]);
}

#[tokio::test]
async fn test_full_run_collects_and_alerts() {
    let fake = FakeRedis::start().await;
    let down = unreachable_server();
    let backend = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());

    let mut orchestrator = FleetOrchestrator::new(
        fleet_config(vec![down.clone(), fake.server_config()]),
        backend.clone(),
        transport.clone(),
    );

    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.state(), RunState::Running);
    assert_eq!(orchestrator.collectors().len(), 2);
    assert_eq!(orchestrator.failures().snapshot(), vec![down.id()]);

    fake.wait_for_monitors(1).await;
    fake.push_line(r#"1577836800.123456 [0 127.0.0.1:6390] "SET" "foo" "bar""#);
    fake.push_line(r#"1577836800.2 [0 127.0.0.1:6390] "INFO""#);
    wait_until(|| {
        orchestrator
            .collectors()
            .iter()
            .any(|c| c.kind == CollectorKind::Command && c.counts().received == 2)
    })
    .await;

    // the alert goes out on shutdown only
    assert!(transport.sent().is_empty());

    let report = orchestrator
        .run(Duration::from_secs(3600), async {})
        .await
        .unwrap();

    assert_eq!(report.reason, StopReason::Interrupt);
    assert_eq!(report.failed, vec![down.id()]);
    assert_eq!(orchestrator.state(), RunState::Stopped);
    assert!(orchestrator.collectors().is_empty());

    let kinds: Vec<_> = report.collectors.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![CollectorKind::Command, CollectorKind::Stats]);
    assert_eq!(report.collectors[0].counts.stored, 1);
    assert_eq!(report.collectors[0].counts.filtered, 1);

    let rows = backend.commands().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].server_id, fake.server_id());
    let storage = report.storage.as_deref().unwrap();
    assert!(storage.starts_with("In-Memory: 1 commands"), "{storage}");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "monitor@example.com");
    assert_eq!(sent[0].to, "ops@example.com");
    assert_eq!(sent[0].smtp_server, "smtp.example.com:2525");
    assert!(sent[0].html.contains(&down.id()));
    assert!(!sent[0].html.contains(&fake.server_id()));

    fake.wait_for_monitors_below(1).await;
}

#[tokio::test]
async fn test_alert_rows_distinct_in_probe_order() {
    let fake = FakeRedis::start().await;
    let (first_port, second_port) = closed_ports().await;
    let first = ServerConfig::new("127.0.0.1", first_port);
    let second = ServerConfig::new("127.0.0.1", second_port);
    let transport = Arc::new(RecordingTransport::default());

    let mut orchestrator = FleetOrchestrator::new(
        fleet_config(vec![
            second.clone(),
            fake.server_config(),
            first.clone(),
            second.clone(),
        ]),
        Arc::new(MemoryBackend::new()),
        transport.clone(),
    );

    let report = orchestrator
        .run(Duration::from_millis(100), std::future::pending())
        .await
        .unwrap();

    assert_eq!(report.reason, StopReason::Deadline);
    assert_eq!(report.failed, vec![second.id(), first.id()]);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let html = &sent[0].html;
    assert_eq!(html.matches(">yes</td>").count(), 2);
    assert!(html.find(&second.id()).unwrap() < html.find(&first.id()).unwrap());
}

#[tokio::test]
async fn test_healthy_fleet_sends_no_alert() {
    let a = FakeRedis::start().await;
    let b = FakeRedis::start().await;
    let transport = Arc::new(RecordingTransport::default());

    let mut orchestrator = FleetOrchestrator::new(
        fleet_config(vec![a.server_config(), b.server_config()]),
        Arc::new(MemoryBackend::new()),
        transport.clone(),
    );

    let report = orchestrator
        .run(Duration::from_millis(200), std::future::pending())
        .await
        .unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.collectors.len(), 4);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_interrupt_from_channel() {
    let fake = FakeRedis::start().await;
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let mut orchestrator = FleetOrchestrator::new(
        fleet_config(vec![fake.server_config()]),
        Arc::new(MemoryBackend::new()),
        Arc::new(RecordingTransport::default()),
    );

    let interrupter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = tx.send(());
    });

    let report = orchestrator
        .run(Duration::from_secs(3600), async {
            let _ = rx.await;
        })
        .await
        .unwrap();

    assert_eq!(report.reason, StopReason::Interrupt);
    interrupter.await.unwrap();
}

#[tokio::test]
async fn test_check_fleet_alerts_without_collectors() {
    let fake = FakeRedis::start().await;
    let down = unreachable_server();
    let transport = Arc::new(RecordingTransport::default());

    let orchestrator = FleetOrchestrator::new(
        fleet_config(vec![fake.server_config(), down.clone()]),
        Arc::new(MemoryBackend::new()),
        transport.clone(),
    );

    let failed = orchestrator.check_fleet().await.unwrap();

    assert_eq!(failed, vec![down.id()]);
    assert_eq!(transport.sent().len(), 1);
    assert!(orchestrator.collectors().is_empty());
    assert_eq!(orchestrator.state(), RunState::Idle);
    assert_eq!(fake.monitor_count(), 0);
}
