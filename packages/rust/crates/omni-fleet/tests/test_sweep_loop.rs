#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{START, beat, config, manager_with};
use omni_fleet::{BroadcastSink, ClientManagerConfig, SweepMode};

fn background_config() -> ClientManagerConfig {
    ClientManagerConfig {
        sweep_mode: SweepMode::Background { interval_secs: 60 },
        ..config(&[1.0], &[10])
    }
}

#[tokio::test(start_paused = true)]
async fn background_loop_marks_idle_clients_dead() {
    let sink = BroadcastSink::new(4);
    let mut rx = sink.subscribe();
    let (manager, clock) = manager_with(background_config());
    let manager = Arc::new(manager.with_sink(Arc::new(sink)));

    let record = manager.ingest_heartbeat("a", &beat(1)).expect("a");
    clock.set(START + 400);

    let handle = manager.spawn_sweep_loop().expect("background mode");
    let event = tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("sweep within two intervals")
        .expect("event");

    assert_eq!(event.newly_dead, vec!["a".to_string()]);
    assert!(!record.is_active());
    assert_eq!(manager.counts().total(), 0);
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn background_loop_exits_when_registry_is_dropped() {
    let (manager, _clock) = manager_with(background_config());
    let manager = Arc::new(manager);
    let handle = manager.spawn_sweep_loop().expect("background mode");

    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(manager);

    tokio::time::timeout(Duration::from_secs(300), handle)
        .await
        .expect("loop ends after the registry is gone")
        .expect("loop task");
}

#[test]
fn per_heartbeat_mode_spawns_nothing() {
    let (manager, _clock) = manager_with(config(&[1.0], &[10]));
    assert!(Arc::new(manager).spawn_sweep_loop().is_none());
}
