//! Lifecycle tests for a single supervised process
mod common;

use common::{fast_sidecar, fixed, wait_until, Harness, Recorder};
use sidekick_engine::domain::ports::{OptionsFactory, ProcessInterceptor};
use sidekick_engine::domain::services::FnOptionsFactory;
use sidekick_engine::{
    PlacementOptions, ProcessHost, ProcessOptions, ProcessStatus, SidecarOptions,
};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn test_options_clone_is_independent() {
    let mut options = SidecarOptions::new("orders").with_app_port(8080);
    options
        .common
        .metrics
        .labels
        .insert("team".to_string(), "payments".to_string());

    let mut copy = options.clone();
    assert_eq!(copy, options);

    copy.common
        .metrics
        .labels
        .insert("team".to_string(), "billing".to_string());
    copy.app_port = Some(9090);

    assert_ne!(copy, options);
    assert_eq!(options.common.metrics.labels["team"], "payments");
    assert_eq!(options.app_port, Some(8080));
}

#[tokio::test]
async fn test_start_stop_notifies_interceptors_in_order() {
    let harness = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first: Arc<dyn ProcessInterceptor<SidecarOptions>> = Recorder::new("first", &log);
    let second: Arc<dyn ProcessInterceptor<SidecarOptions>> = Recorder::new("second", &log);
    let host = harness.host_with("daprd", vec![first, second]);

    host.start(fixed(fast_sidecar("orders")), CancellationToken::new())
        .await;
    wait_until(|| host.process_info().description() == "Process is healthy").await;
    host.stop(CancellationToken::new()).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:starting",
            "second:starting",
            "first:started",
            "second:started",
            "first:stopping",
            "second:stopping",
            "first:stopped",
            "second:stopped",
        ]
    );
    let info = host.process_info();
    assert_eq!(info.status(), ProcessStatus::Stopped);
    assert_eq!(info.pid(), None);
}

#[tokio::test]
async fn test_interceptor_veto_fails_without_spawn() {
    let harness = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let veto: Arc<dyn ProcessInterceptor<SidecarOptions>> = Recorder::rejecting("veto", &log);
    let after: Arc<dyn ProcessInterceptor<SidecarOptions>> = Recorder::new("after", &log);
    let host = harness.host_with("daprd", vec![veto, after]);

    host.start(fixed(fast_sidecar("orders")), CancellationToken::new())
        .await;

    assert_eq!(harness.executor.spawn_count(), 0);
    let info = host.process_info();
    assert_eq!(info.status(), ProcessStatus::Failed);
    assert!(info.description().starts_with("Failed to start"), "{}", info.description());
    assert_eq!(*log.lock().unwrap(), vec!["veto:starting"]);
}

#[tokio::test]
async fn test_unexpected_exit_restarts_after_delay() {
    let harness = Harness::new();
    let host = harness.host::<PlacementOptions>("placement");
    let mut options = PlacementOptions::default();
    options.common.restart_after_millis = Some(50);

    host.start(fixed(options), CancellationToken::new()).await;
    let first = harness.executor.last_process().unwrap();
    first.exit_with(Some(2));

    wait_until(|| host.process_info().status() == ProcessStatus::Failed).await;
    assert!(host
        .process_info()
        .description()
        .contains("exit code: 2"));

    wait_until(|| harness.executor.spawn_count() == 2).await;
    wait_until(|| host.process_info().is_running()).await;
    assert_eq!(host.process_info().pid(), Some(1001));

    host.stop(CancellationToken::new()).await;
}

#[tokio::test]
async fn test_stop_cancels_pending_restart() {
    let harness = Harness::new();
    let host = harness.host::<PlacementOptions>("placement");
    let mut options = PlacementOptions::default();
    options.common.restart_after_millis = Some(200);

    host.start(fixed(options), CancellationToken::new()).await;
    harness.executor.last_process().unwrap().exit_with(Some(1));
    wait_until(|| host.process_info().status() == ProcessStatus::Failed).await;

    host.stop(CancellationToken::new()).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(harness.executor.spawn_count(), 1);
    assert_eq!(host.process_info().status(), ProcessStatus::Failed);
}

#[tokio::test]
async fn test_stale_readiness_does_not_overwrite_stopped() {
    let harness = Harness::new();
    harness.http.healthy_after(Duration::from_millis(150));
    let host = harness.host::<SidecarOptions>("daprd");

    host.start(fixed(fast_sidecar("orders")), CancellationToken::new())
        .await;
    host.stop(CancellationToken::new()).await;
    let stopped = host.process_info();
    assert_eq!(stopped.status(), ProcessStatus::Stopped);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(host.process_info(), stopped);
}

#[tokio::test]
async fn test_health_follows_probe() {
    let harness = Harness::new();
    harness.http.healthy_after(Duration::from_millis(200));
    let host = harness.host::<SidecarOptions>("daprd");

    host.start(fixed(fast_sidecar("orders")), CancellationToken::new())
        .await;

    assert!(!host.health(CancellationToken::new()).await.is_healthy());
    assert_eq!(
        host.process_info().description(),
        "Process started, waiting for readiness"
    );

    wait_until(|| host.process_info().description() == "Process is healthy").await;
    assert!(host.health(CancellationToken::new()).await.is_healthy());

    host.stop(CancellationToken::new()).await;
    assert!(!host.health(CancellationToken::new()).await.is_healthy());
}

#[tokio::test]
async fn test_refresh_restarts_only_on_change() {
    let harness = Harness::new();
    let host = harness.host::<SidecarOptions>("daprd");
    let port = Arc::new(AtomicU16::new(8080));
    let factory: Arc<dyn OptionsFactory<SidecarOptions>> = {
        let port = Arc::clone(&port);
        Arc::new(FnOptionsFactory(move || {
            Ok(fast_sidecar("orders").with_app_port(port.load(Ordering::SeqCst)))
        }))
    };

    host.start(factory, CancellationToken::new()).await;
    host.refresh(CancellationToken::new()).await;
    assert_eq!(harness.executor.spawn_count(), 1);

    port.store(8081, Ordering::SeqCst);
    host.refresh(CancellationToken::new()).await;

    assert_eq!(harness.executor.spawn_count(), 2);
    assert!(host.process_info().is_running());
    assert_eq!(host.process_options().unwrap().app_port, Some(8081));
    let args = harness.executor.last_config().unwrap().args;
    assert!(args.windows(2).any(|w| w[0] == "--app-port" && w[1] == "8081"), "{:?}", args);

    host.stop(CancellationToken::new()).await;
}

#[tokio::test]
async fn test_restart_uses_last_factory() {
    let harness = Harness::new();
    let host = harness.host::<SidecarOptions>("daprd");

    host.restart(CancellationToken::new()).await;
    assert_eq!(harness.executor.spawn_count(), 0);

    host.start(fixed(fast_sidecar("orders")), CancellationToken::new())
        .await;
    host.restart(CancellationToken::new()).await;

    assert_eq!(harness.executor.spawn_count(), 2);
    let info = host.process_info();
    assert!(info.is_running());
    assert_eq!(info.pid(), Some(1001));
    assert_eq!(harness.executor.last_process().unwrap().terminate_calls(), 0);

    host.stop(CancellationToken::new()).await;
}

#[tokio::test]
async fn test_disabled_process_reports_reason() {
    let harness = Harness::new();
    let host = harness.host::<PlacementOptions>("placement");
    let mut options = PlacementOptions::default();
    options.common.enabled = false;

    host.start(fixed(options.clone()), CancellationToken::new())
        .await;

    let info = host.process_info();
    assert_eq!(info.status(), ProcessStatus::Disabled);
    assert_eq!(Some(info.description().to_string()), options.disabled_reason());
    assert_eq!(host.process_options(), Some(options));
    assert_eq!(harness.executor.spawn_count(), 0);
}
