//! Where sweep transitions go.
//!
//! ```text
//! sweep (registry lock held) → TransitionEvent
//!      ↓ (lock released)
//! TransitionSink::on_transitions
//!      ├─ TracingSink   → log lines
//!      └─ BroadcastSink → broadcast::Sender → subscribers
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use crate::RegistrySummary;

/// Clients whose liveness flipped during one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    /// Sweep time in seconds.
    pub timestamp: u64,
    /// Identities that went from active to dead, sorted.
    pub newly_dead: Vec<String>,
    /// Identities that went from dead to active, sorted.
    pub newly_alive: Vec<String>,
    /// Composition after the sweep.
    pub summary: RegistrySummary,
}

/// Receives transition events. Called without any registry lock held.
pub trait TransitionSink: Send + Sync {
    /// Handle one sweep's transitions.
    fn on_transitions(&self, event: &TransitionEvent);
}

/// Logs transitions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TransitionSink for TracingSink {
    fn on_transitions(&self, event: &TransitionEvent) {
        tracing::info!(
            timestamp = event.timestamp,
            newly_dead = event.newly_dead.len(),
            newly_alive = event.newly_alive.len(),
            summary = %event.summary,
            "client liveness changed"
        );
        for identity in &event.newly_dead {
            tracing::info!(%identity, "client newly dead");
        }
        for identity in &event.newly_alive {
            tracing::info!(%identity, "client newly alive");
        }
    }
}

/// Fans transition events out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TransitionEvent>,
    capacity: usize,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per lagging subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Receive all future events. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.tx.subscribe()
    }

    /// Current subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl TransitionSink for BroadcastSink {
    fn on_transitions(&self, event: &TransitionEvent) {
        // Err only means nobody is subscribed.
        let delivered = self.tx.send(event.clone()).unwrap_or(0);
        tracing::trace!(
            delivered,
            timestamp = event.timestamp,
            "client transition event broadcast"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp: u64) -> TransitionEvent {
        TransitionEvent {
            timestamp,
            newly_dead: vec!["worker-a".to_string()],
            newly_alive: Vec::new(),
            summary: RegistrySummary {
                known_clients: 1,
                total_active: 0,
                per_type: Vec::new(),
            },
        }
    }

    #[test]
    fn broadcast_without_subscribers_is_dropped() {
        let sink = BroadcastSink::new(2);
        sink.on_transitions(&event(1));

        let mut rx = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);
        sink.on_transitions(&event(2));
        assert_eq!(rx.try_recv().map(|e| e.timestamp), Ok(2));
        assert!(rx.try_recv().is_err());
    }
}
