//! Client registry: identity map, per-type counters, heartbeat ingestion.
//!
//! Lock hierarchy, always top-down:
//!
//! ```text
//! registry (map + counters + ratios)
//!   └─ record (type, active flag, last update)
//!        └─ thread slot (last state, last change)
//! ```
//!
//! The registry lock is held across lookup/create/allocate and across the
//! whole sweep. Sinks run after it is released.

mod allocation;
mod summary;
mod sweep;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::validate_ratios;
use crate::sink::{TracingSink, TransitionSink};
use crate::{
    ClientManagerConfig, ClientRecord, ClientSnapshot, Clock, RegistryError, SweepMode,
    SystemClock, ThreadState,
};

pub use allocation::{AllocationOutcome, TypeCounts};
pub use summary::{RegistrySummary, TypeShare};
pub use sweep::SweepReport;

struct RegistryInner<S> {
    records: HashMap<String, Arc<ClientRecord<S>>>,
    counts: TypeCounts,
    config: ClientManagerConfig,
}

impl<S> RegistryInner<S> {
    fn allocate(&mut self) -> AllocationOutcome {
        self.counts.allocate(
            &self.config.client_type_ratios,
            &self.config.client_type_limits,
        )
    }

    fn no_eligible_type(&self) -> RegistryError {
        RegistryError::NoEligibleType {
            per_type: self.counts.per_type().to_vec(),
            limits: self.config.client_type_limits.clone(),
        }
    }

    fn summary(&self) -> RegistrySummary {
        RegistrySummary::from_counts(&self.counts, self.records.len())
    }
}

/// Thread-safe registry of fleet clients.
///
/// `S` is the per-thread payload; the registry only compares it for equality.
pub struct ClientManager<S = ThreadState> {
    inner: Mutex<RegistryInner<S>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TransitionSink>,
    num_threads: usize,
    max_delay_secs: u64,
    sweep_mode: SweepMode,
}

impl<S: Clone + PartialEq + Default> ClientManager<S> {
    /// Registry on the wall clock, logging transitions via `tracing`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidConfig` if the config fails validation.
    pub fn new(config: ClientManagerConfig) -> Result<Self, RegistryError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Registry on an injected clock.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidConfig` if the config fails validation.
    pub fn with_clock(
        config: ClientManagerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RegistryError> {
        config.validate()?;
        Ok(Self {
            num_threads: config.max_num_threads,
            max_delay_secs: config.client_max_delay_secs,
            sweep_mode: config.sweep_mode,
            inner: Mutex::new(RegistryInner {
                records: HashMap::new(),
                counts: TypeCounts::new(config.num_types()),
                config,
            }),
            clock,
            sink: Arc::new(TracingSink),
        })
    }

    /// Replace the transition sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.sink = sink;
        self
    }

    fn lock_inner(&self) -> MutexGuard<'_, RegistryInner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn current_timestamp(&self) -> u64 {
        self.clock.now_secs()
    }

    /// Sweep scheduling this registry was built with.
    #[must_use]
    pub fn sweep_mode(&self) -> SweepMode {
        self.sweep_mode
    }

    /// Copy of the current config, including any ratio updates.
    #[must_use]
    pub fn config(&self) -> ClientManagerConfig {
        self.lock_inner().config.clone()
    }

    /// Copy of the per-type active counters.
    #[must_use]
    pub fn counts(&self) -> TypeCounts {
        self.lock_inner().counts.clone()
    }

    /// Number of clients ever seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_inner().records.len()
    }

    /// Whether no client has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record one heartbeat: `(thread id → state)` for client `identity`.
    ///
    /// Unknown identities are registered and allocated a type first. Under
    /// `SweepMode::PerHeartbeat` every call then sweeps all records.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ThreadOutOfRange` if any thread id is not below
    ///   `max_num_threads`; nothing is changed.
    /// - `RegistryError::NoEligibleType` if `identity` is new and no type can be
    ///   allocated; the client is not registered.
    pub fn ingest_heartbeat(
        &self,
        identity: &str,
        updates: &HashMap<usize, S>,
    ) -> Result<Arc<ClientRecord<S>>, RegistryError> {
        if let Some(&thread_id) = updates.keys().find(|&&id| id >= self.num_threads) {
            return Err(RegistryError::ThreadOutOfRange {
                identity: identity.to_string(),
                thread_id,
                num_threads: self.num_threads,
            });
        }

        let (record, event) = {
            let mut inner = self.lock_inner();
            let record = self.get_or_create_locked(&mut inner, identity)?;
            for (&thread_id, state) in updates {
                record.update_thread(thread_id, state);
            }
            let event = match self.sweep_mode {
                SweepMode::PerHeartbeat => {
                    let report = self.sweep_locked(&mut inner);
                    report.into_event(inner.summary())
                }
                SweepMode::Background { .. } => None,
            };
            (record, event)
        };

        if let Some(event) = event {
            self.sink.on_transitions(&event);
        }
        Ok(record)
    }

    /// Look up a client without registering it.
    #[must_use]
    pub fn get_record(&self, identity: &str) -> Option<Arc<ClientRecord<S>>> {
        self.lock_inner().records.get(identity).cloned()
    }

    /// Look up a client, registering and allocating it if unseen.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NoEligibleType` if the client is new and no type
    /// can be allocated.
    pub fn ensure_client(&self, identity: &str) -> Result<Arc<ClientRecord<S>>, RegistryError> {
        let mut inner = self.lock_inner();
        self.get_or_create_locked(&mut inner, identity)
    }

    /// Replace the ratio targets. Already-assigned clients keep their types.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidConfig` if the length differs from the
    /// configured limits or a ratio is negative or not finite.
    pub fn set_type_ratios(&self, ratios: Vec<f32>) -> Result<(), RegistryError> {
        let mut inner = self.lock_inner();
        validate_ratios(&ratios, inner.config.num_types())?;
        tracing::debug!(
            old = ?inner.config.client_type_ratios,
            new = ?ratios,
            "client type ratios replaced"
        );
        inner.config.client_type_ratios = ratios;
        Ok(())
    }

    /// Active count and fraction per type.
    #[must_use]
    pub fn describe(&self) -> RegistrySummary {
        self.lock_inner().summary()
    }

    /// Snapshot of every known client, sorted by identity.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ClientSnapshot> {
        let inner = self.lock_inner();
        let mut snapshots: Vec<ClientSnapshot> =
            inner.records.values().map(|record| record.snapshot()).collect();
        snapshots.sort_by(|a, b| a.identity.cmp(&b.identity));
        snapshots
    }

    /// `(identity, delay)` for every client idle for at least its timeout, sorted by identity.
    #[must_use]
    pub fn stuck_clients(&self) -> Vec<(String, u64)> {
        let now = self.clock.now_secs();
        let inner = self.lock_inner();
        let mut stuck: Vec<(String, u64)> = inner
            .records
            .values()
            .filter_map(|record| match record.is_stuck(now) {
                (true, delay) => Some((record.id().to_string(), delay)),
                (false, _) => None,
            })
            .collect();
        stuck.sort();
        stuck
    }

    fn get_or_create_locked(
        &self,
        inner: &mut RegistryInner<S>,
        identity: &str,
    ) -> Result<Arc<ClientRecord<S>>, RegistryError> {
        if let Some(record) = inner.records.get(identity) {
            return Ok(Arc::clone(record));
        }

        let record = ClientRecord::new(
            identity,
            self.num_threads,
            self.max_delay_secs,
            Arc::clone(&self.clock),
        );
        let AllocationOutcome::Allocated(client_type) = inner.allocate() else {
            let error = inner.no_eligible_type();
            tracing::error!(%identity, %error, "cannot register client");
            return Err(error);
        };
        record.set_type(client_type);

        let record = Arc::new(record);
        inner
            .records
            .insert(identity.to_string(), Arc::clone(&record));
        tracing::debug!(%identity, client_type, known = inner.records.len(), "client registered");
        Ok(record)
    }
}

impl<S> std::fmt::Debug for ClientManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientManager")
            .field("num_threads", &self.num_threads)
            .field("max_delay_secs", &self.max_delay_secs)
            .field("sweep_mode", &self.sweep_mode)
            .finish_non_exhaustive()
    }
}
