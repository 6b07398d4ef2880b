//! Per-client record: assigned type, cached liveness, and thread slots.
//!
//! Lock order inside a record is record state first, then a single thread
//! slot. Nothing here reaches back into the registry; the only shared
//! capability a record holds is the clock.

mod slot;

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::Clock;
use crate::ThreadState;

pub(crate) use slot::ThreadSlot;
pub use slot::ThreadSnapshot;

/// Role ordinal assigned to a client, indexing the configured ratios/limits.
pub type ClientType = usize;

/// Result of one liveness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientChange {
    /// Was active, still active.
    Alive,
    /// Was dead, still dead.
    Dead,
    /// Was active, timed out on this evaluation.
    AliveToDead,
    /// Was dead, reported new state since.
    DeadToAlive,
}

impl ClientChange {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Dead => "dead",
            Self::AliveToDead => "alive_to_dead",
            Self::DeadToAlive => "dead_to_alive",
        }
    }
}

/// Consistent multi-field view of a record, read under one lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    /// Client identity.
    pub identity: String,
    /// Assigned type, `None` until the first allocation.
    pub client_type: Option<ClientType>,
    /// Cached liveness flag as of the last sweep.
    pub active: bool,
    /// Time (seconds) of the last state change on any thread.
    pub last_update: u64,
    /// Sequence number.
    pub seq: i64,
}

#[derive(Debug)]
struct RecordState {
    client_type: Option<ClientType>,
    active: bool,
    last_update: u64,
    // Set when a revival found no free type; cleared by the next state change.
    revival_held: bool,
}

/// One connected worker.
pub struct ClientRecord<S = ThreadState> {
    identity: String,
    clock: Arc<dyn Clock>,
    max_delay_secs: u64,
    seq: AtomicI64,
    state: Mutex<RecordState>,
    threads: Box<[ThreadSlot<S>]>,
}

impl<S> Debug for ClientRecord<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRecord")
            .field("identity", &self.identity)
            .field("max_delay_secs", &self.max_delay_secs)
            .field("num_threads", &self.threads.len())
            .finish_non_exhaustive()
    }
}

impl<S: Clone + PartialEq + Default> ClientRecord<S> {
    /// New record: active, unassigned, last update = now.
    pub(crate) fn new(
        identity: &str,
        num_threads: usize,
        max_delay_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_secs();
        let threads = (0..num_threads).map(|_| ThreadSlot::new(now)).collect();
        Self {
            identity: identity.to_string(),
            clock,
            max_delay_secs,
            seq: AtomicI64::new(0),
            state: Mutex::new(RecordState {
                client_type: None,
                active: true,
                last_update: now,
                revival_held: false,
            }),
            threads,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Client identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.identity
    }

    /// Number of thread slots, fixed at creation.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Inactivity timeout copied from the config at creation.
    #[must_use]
    pub fn max_delay_secs(&self) -> u64 {
        self.max_delay_secs
    }

    /// Sequence number (0 until the scheduler bumps it).
    #[must_use]
    pub fn seq(&self) -> i64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Whether the scheduler has not yet bumped the sequence number.
    #[must_use]
    pub fn just_allocated(&self) -> bool {
        self.seq() == 0
    }

    /// Bump the sequence number, returning the new value.
    pub fn inc_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Assigned type.
    #[must_use]
    pub fn client_type(&self) -> Option<ClientType> {
        self.lock_state().client_type
    }

    pub(crate) fn set_type(&self, client_type: ClientType) {
        self.lock_state().client_type = Some(client_type);
    }

    /// Cached liveness flag. Not recomputed here.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock_state().active
    }

    /// Time (seconds) of the last thread state change.
    #[must_use]
    pub fn last_update(&self) -> u64 {
        self.lock_state().last_update
    }

    /// Whether `now` is at least `max_delay_secs` past the last update, with the delay.
    #[must_use]
    pub fn is_stuck(&self, now: u64) -> (bool, u64) {
        let delay = now.saturating_sub(self.lock_state().last_update);
        (delay >= self.max_delay_secs, delay)
    }

    /// Type, flag, timestamp and sequence read together.
    #[must_use]
    pub fn snapshot(&self) -> ClientSnapshot {
        let state = self.lock_state();
        ClientSnapshot {
            identity: self.identity.clone(),
            client_type: state.client_type,
            active: state.active,
            last_update: state.last_update,
            seq: self.seq(),
        }
    }

    /// Last state reported by one thread, `None` if the slot does not exist.
    #[must_use]
    pub fn thread(&self, thread_id: usize) -> Option<ThreadSnapshot<S>> {
        let _state = self.lock_state();
        self.threads.get(thread_id).map(ThreadSlot::snapshot)
    }

    /// Apply one thread's reported state. A changed state refreshes the activity timestamp.
    ///
    /// Returns whether the slot changed.
    ///
    /// # Panics
    ///
    /// Panics if `thread_id >= self.num_threads()`. Heartbeats are validated by the
    /// registry before they reach a record.
    pub fn update_thread(&self, thread_id: usize, state: &S) -> bool {
        assert!(
            thread_id < self.threads.len(),
            "thread id {thread_id} out of range for client {} ({} slots)",
            self.identity,
            self.threads.len()
        );
        let mut record = self.lock_state();
        let now = self.clock.now_secs();
        let changed = self.threads[thread_id].update(state, now);
        if changed {
            record.last_update = record.last_update.max(now);
            record.revival_held = false;
        }
        changed
    }

    /// Recompute liveness at `now` and flip the cached flag on a transition.
    pub(crate) fn refresh_liveness(&self, now: u64) -> ClientChange {
        let mut state = self.lock_state();
        let currently_active = now.saturating_sub(state.last_update) < self.max_delay_secs;
        match (state.active, currently_active) {
            (true, true) => ClientChange::Alive,
            (true, false) => {
                state.active = false;
                ClientChange::AliveToDead
            }
            (false, true) if !state.revival_held => {
                state.active = true;
                ClientChange::DeadToAlive
            }
            (false, _) => ClientChange::Dead,
        }
    }

    /// Undo a `DeadToAlive` flip the registry could not allocate a type for.
    ///
    /// The record stays dead until a thread reports a new state.
    pub(crate) fn revert_revival(&self) {
        let mut state = self.lock_state();
        state.active = false;
        state.revival_held = true;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;
    use crate::ManualClock;

    fn record(clock: &Arc<ManualClock>, max_delay_secs: u64) -> ClientRecord<u32> {
        let clock: Arc<dyn Clock> = clock.clone();
        ClientRecord::new("worker-a", 2, max_delay_secs, clock)
    }

    #[test]
    fn liveness_state_machine_follows_timeout() {
        let clock = Arc::new(ManualClock::new(1_000));
        let record = record(&clock, 300);

        assert_eq!(record.refresh_liveness(1_299), ClientChange::Alive);
        assert_eq!(record.refresh_liveness(1_300), ClientChange::AliveToDead);
        assert!(!record.is_active());
        assert_eq!(record.refresh_liveness(1_400), ClientChange::Dead);

        clock.set(1_500);
        assert!(record.update_thread(1, &9));
        assert_eq!(record.refresh_liveness(1_500), ClientChange::DeadToAlive);
        assert!(record.is_active());
        assert_eq!(record.refresh_liveness(1_501), ClientChange::Alive);
    }

    #[test]
    fn unchanged_state_does_not_refresh_activity() {
        let clock = Arc::new(ManualClock::new(0));
        let record = record(&clock, 300);
        clock.set(10);
        assert!(record.update_thread(0, &5));
        clock.set(20);
        assert!(!record.update_thread(0, &5));
        assert_eq!(record.last_update(), 10);
        assert_eq!(
            record.thread(0),
            Some(ThreadSnapshot {
                last_state: 5,
                last_change: 10
            })
        );
    }

    #[test]
    fn is_stuck_reports_delay_independent_of_flag() {
        let clock = Arc::new(ManualClock::new(100));
        let record = record(&clock, 60);
        assert_eq!(record.is_stuck(159), (false, 59));
        assert_eq!(record.is_stuck(160), (true, 60));
        assert!(record.is_active());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_thread_panics() {
        let clock = Arc::new(ManualClock::new(0));
        let record = record(&clock, 300);
        record.update_thread(2, &1);
    }

    /// Clock that can be wound back, unlike `ManualClock`.
    struct RewindableClock(AtomicU64);

    impl Clock for RewindableClock {
        fn now_secs(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn regressing_clock_never_moves_timestamps_back() {
        let clock = Arc::new(RewindableClock(AtomicU64::new(500)));
        let shared: Arc<dyn Clock> = clock.clone();
        let record = ClientRecord::<u32>::new("worker-a", 1, 300, shared);

        assert!(record.update_thread(0, &1));
        clock.0.store(400, Ordering::SeqCst);
        assert!(record.update_thread(0, &2));

        assert_eq!(record.last_update(), 500);
        assert_eq!(record.thread(0).map(|t| t.last_change), Some(500));
        assert_eq!(record.refresh_liveness(799), ClientChange::Alive);
        assert_eq!(record.refresh_liveness(800), ClientChange::AliveToDead);
    }

    #[test]
    fn held_revival_waits_for_new_state() {
        let clock = Arc::new(ManualClock::new(0));
        let record = record(&clock, 300);
        assert_eq!(record.refresh_liveness(300), ClientChange::AliveToDead);

        clock.set(310);
        assert!(record.update_thread(0, &1));
        assert_eq!(record.refresh_liveness(310), ClientChange::DeadToAlive);
        record.revert_revival();
        assert_eq!(record.refresh_liveness(320), ClientChange::Dead);

        clock.set(330);
        assert!(record.update_thread(0, &2));
        assert_eq!(record.refresh_liveness(330), ClientChange::DeadToAlive);
    }

    #[test]
    fn sequence_counter_tracks_allocation() {
        let clock = Arc::new(ManualClock::new(0));
        let record = record(&clock, 300);
        assert!(record.just_allocated());
        assert_eq!(record.inc_seq(), 1);
        assert!(!record.just_allocated());
        assert_eq!(record.snapshot().seq, 1);
    }
}
