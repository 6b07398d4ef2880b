//! omni-fleet: client registry for training fleets.
//!
//! Tracks which workers ("clients") are connected, the role ("type") each
//! holds, whether each is alive, and the last state of every worker thread.
//! Every heartbeat goes through [`ClientManager::ingest_heartbeat`]; the
//! registry keeps per-type active counts and steers new and revived clients
//! toward the configured ratios without exceeding per-type limits.
//!
//! # Architecture
//!
//! ```text
//! heartbeat (identity, {thread_id → state})
//!      ↓
//! ClientManager   ── registry lock: map, per-type counts, ratios
//!      ↓
//! ClientRecord    ── record lock: type, active flag, last update
//!      ↓
//! ThreadSlot      ── slot lock: last state, last change
//!      ↓
//! sweep → TransitionEvent → TransitionSink
//! ```
//!
//! # Examples
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use omni_fleet::{ClientManager, ClientManagerConfig, ManualClock, ThreadState};
//!
//! let config = ClientManagerConfig {
//!     client_type_ratios: vec![0.5, 0.5],
//!     client_type_limits: vec![100, 100],
//!     max_num_threads: 2,
//!     ..ClientManagerConfig::default()
//! };
//! let clock = Arc::new(ManualClock::new(1_000));
//! let manager: ClientManager = ClientManager::with_clock(config, clock)?;
//!
//! let mut updates = HashMap::new();
//! updates.insert(0, ThreadState { thread_id: 0, seq: 1, ..ThreadState::default() });
//! let record = manager.ingest_heartbeat("worker-1", &updates)?;
//! assert_eq!(record.client_type(), Some(0));
//! # Ok::<(), omni_fleet::RegistryError>(())
//! ```

// ============================================================================
// Core modules
// ============================================================================

mod clock;
mod config;
mod error;
mod manager;
mod record;
mod sink;
mod state;

// ============================================================================
// Public exports
// ============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ClientManagerConfig, FleetSettings, RegistrySettings, SweepMode, fleet_settings_paths,
    load_fleet_settings, load_fleet_settings_from_paths,
};
pub use error::RegistryError;
pub use manager::{
    AllocationOutcome, ClientManager, RegistrySummary, SweepReport, TypeCounts, TypeShare,
};
pub use record::{ClientChange, ClientRecord, ClientSnapshot, ClientType, ThreadSnapshot};
pub use sink::{BroadcastSink, TracingSink, TransitionEvent, TransitionSink};
pub use state::ThreadState;
