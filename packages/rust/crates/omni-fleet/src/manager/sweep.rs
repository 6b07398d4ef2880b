use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{ClientChange, RegistryError, RegistrySummary, SweepMode, TransitionEvent};

use super::{AllocationOutcome, ClientManager, RegistryInner};

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Sweep time in seconds.
    pub timestamp: u64,
    /// Clients that timed out, sorted.
    pub newly_dead: Vec<String>,
    /// Clients that reported again and were re-allocated, sorted.
    pub newly_alive: Vec<String>,
    /// Clients that reported again but got no type; they stay dead.
    pub unallocated: Vec<String>,
}

impl SweepReport {
    /// Whether any client flipped liveness.
    #[must_use]
    pub fn has_transitions(&self) -> bool {
        !self.newly_dead.is_empty() || !self.newly_alive.is_empty()
    }

    pub(super) fn into_event(self, summary: RegistrySummary) -> Option<TransitionEvent> {
        if !self.has_transitions() {
            return None;
        }
        Some(TransitionEvent {
            timestamp: self.timestamp,
            newly_dead: self.newly_dead,
            newly_alive: self.newly_alive,
            summary,
        })
    }
}

impl<S: Clone + PartialEq + Default> ClientManager<S> {
    /// Recompute liveness for every client and reconcile the type counters.
    ///
    /// Dead clients release their type; revived clients go through allocation
    /// again and may land on a different type.
    pub fn sweep(&self) -> SweepReport {
        let (report, event) = {
            let mut inner = self.lock_inner();
            let report = self.sweep_locked(&mut inner);
            let event = report.clone().into_event(inner.summary());
            (report, event)
        };
        if let Some(event) = event {
            self.sink.on_transitions(&event);
        }
        report
    }

    pub(super) fn sweep_locked(&self, inner: &mut RegistryInner<S>) -> SweepReport {
        let now = self.clock.now_secs();
        let RegistryInner {
            records,
            counts,
            config,
        } = inner;

        let mut report = SweepReport {
            timestamp: now,
            ..SweepReport::default()
        };
        // Release every timed-out type before any revival competes for a slot.
        let mut revived = Vec::new();
        for (identity, record) in &*records {
            match record.refresh_liveness(now) {
                ClientChange::AliveToDead => {
                    if let Some(client_type) = record.client_type() {
                        counts.deallocate(client_type);
                    }
                    report.newly_dead.push(identity.clone());
                }
                ClientChange::DeadToAlive => revived.push((identity, record)),
                ClientChange::Alive | ClientChange::Dead => {}
            }
        }
        report.newly_dead.sort();

        revived.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (identity, record) in revived {
            match counts.allocate(&config.client_type_ratios, &config.client_type_limits) {
                AllocationOutcome::Allocated(client_type) => {
                    record.set_type(client_type);
                    report.newly_alive.push(identity.clone());
                }
                AllocationOutcome::NoEligibleType => {
                    record.revert_revival();
                    let error = RegistryError::NoEligibleType {
                        per_type: counts.per_type().to_vec(),
                        limits: config.client_type_limits.clone(),
                    };
                    tracing::error!(
                        %identity,
                        %error,
                        "revived client left dead until its next state change"
                    );
                    report.unallocated.push(identity.clone());
                }
            }
        }
        report
    }
}

impl<S: Clone + PartialEq + Default + Send + 'static> ClientManager<S> {
    /// Start the periodic sweep for `SweepMode::Background` registries.
    ///
    /// Returns `None` under `SweepMode::PerHeartbeat`. The task ends on the first
    /// tick after the last `Arc` to the registry is dropped. Must be called from
    /// inside a Tokio runtime.
    #[must_use]
    pub fn spawn_sweep_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let SweepMode::Background { interval_secs } = self.sweep_mode else {
            return None;
        };
        let manager = Arc::downgrade(self);
        Some(tokio::spawn(run_sweep_loop(
            manager,
            Duration::from_secs(interval_secs.max(1)),
        )))
    }
}

async fn run_sweep_loop<S>(manager: Weak<ClientManager<S>>, interval: Duration)
where
    S: Clone + PartialEq + Default + Send + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(registry) = manager.upgrade() else {
            tracing::debug!("client registry dropped; sweep loop exiting");
            break;
        };
        let report = registry.sweep();
        tracing::trace!(
            timestamp = report.timestamp,
            newly_dead = report.newly_dead.len(),
            newly_alive = report.newly_alive.len(),
            unallocated = report.unallocated.len(),
            "background sweep finished"
        );
    }
}
