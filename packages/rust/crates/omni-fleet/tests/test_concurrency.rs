//! Many threads heartbeating one registry while another sweeps.

#![allow(missing_docs)]

mod common;

use std::collections::HashMap;

use common::{START, assert_counts_consistent, manager, state};

const WORKERS: usize = 8;
const CLIENTS_PER_WORKER: usize = 16;
const ROUNDS: i64 = 50;

#[test]
fn concurrent_heartbeats_keep_counts_consistent() {
    let (manager, clock) = manager(&[0.6, 0.3, 0.1], &[usize::MAX, 40, 10]);

    std::thread::scope(|scope| {
        for worker in 0..WORKERS {
            let manager = &manager;
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    for client in 0..CLIENTS_PER_WORKER {
                        // Odd clients stop changing state halfway and eventually time out.
                        let seq = if client % 2 == 1 && round > ROUNDS / 2 {
                            ROUNDS / 2
                        } else {
                            round
                        };
                        let identity = format!("w{worker}-c{client}");
                        let updates = HashMap::from([
                            (0, state(0, seq)),
                            (client % 4, state(client % 4, seq)),
                        ]);
                        manager
                            .ingest_heartbeat(&identity, &updates)
                            .expect("heartbeat");
                    }
                }
            });
        }
        let clock = &clock;
        let manager = &manager;
        scope.spawn(move || {
            for step in 1..=20 {
                clock.set(START + step * 30);
                manager.sweep();
                std::thread::yield_now();
            }
        });
    });

    assert_eq!(manager.len(), WORKERS * CLIENTS_PER_WORKER);
    assert_counts_consistent(&manager);
    let counts = manager.counts();
    assert!(counts.per_type()[1] <= 40);
    assert!(counts.per_type()[2] <= 10);
    for snapshot in manager.snapshots() {
        assert!(snapshot.client_type.is_some());
    }
}

#[test]
fn parallel_registration_of_one_identity_creates_one_record() {
    let (manager, _clock) = manager(&[1.0], &[usize::MAX]);

    std::thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                manager.ensure_client("shared").expect("register");
            });
        }
    });

    assert_eq!(manager.len(), 1);
    assert_eq!(manager.counts().total(), 1);
}
