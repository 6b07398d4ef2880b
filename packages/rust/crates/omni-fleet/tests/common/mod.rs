#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use omni_fleet::{ClientManager, ClientManagerConfig, ManualClock, SweepMode, ThreadState};

pub const START: u64 = 1_000_000;

pub fn config(ratios: &[f32], limits: &[usize]) -> ClientManagerConfig {
    ClientManagerConfig {
        client_type_ratios: ratios.to_vec(),
        client_type_limits: limits.to_vec(),
        max_num_threads: 4,
        client_max_delay_secs: 300,
        sweep_mode: SweepMode::PerHeartbeat,
    }
}

pub fn manager_with(config: ClientManagerConfig) -> (ClientManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let manager = ClientManager::with_clock(config, clock.clone()).expect("valid config");
    (manager, clock)
}

pub fn manager(ratios: &[f32], limits: &[usize]) -> (ClientManager, Arc<ManualClock>) {
    manager_with(config(ratios, limits))
}

pub fn state(thread_id: usize, seq: i64) -> ThreadState {
    ThreadState {
        thread_id: i32::try_from(thread_id).expect("small thread id"),
        seq,
        ..ThreadState::default()
    }
}

/// Heartbeat carrying `seq` on thread 0.
pub fn beat(seq: i64) -> HashMap<usize, ThreadState> {
    HashMap::from([(0, state(0, seq))])
}

/// `total == Σ per_type == number of active records`.
pub fn assert_counts_consistent(manager: &ClientManager) {
    let counts = manager.counts();
    let active = manager.snapshots().iter().filter(|s| s.active).count();
    assert_eq!(counts.per_type().iter().sum::<usize>(), counts.total());
    assert_eq!(counts.total(), active);
}
