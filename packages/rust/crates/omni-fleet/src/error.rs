//! Error types for registry operations.
//!
//! Follows ODF-REP: Library crates use `thiserror` for explicit error enums.

use thiserror::Error;

/// Errors surfaced by `ClientManager` and its configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Configuration is internally inconsistent (ratio/limit length mismatch, no types, ...).
    #[error("Invalid registry config: {0}")]
    InvalidConfig(String),

    /// A heartbeat referenced a thread slot the record does not have.
    #[error("Thread id {thread_id} out of range for client {identity} ({num_threads} slots)")]
    ThreadOutOfRange {
        /// Client identity carried by the heartbeat.
        identity: String,
        /// Offending thread id.
        thread_id: usize,
        /// Configured slots per client.
        num_threads: usize,
    },

    /// No client type is under its ratio target or under its limit.
    #[error("No eligible client type: active per type {per_type:?}, limits {limits:?}")]
    NoEligibleType {
        /// Active clients per type at the time of the attempt.
        per_type: Vec<usize>,
        /// Configured limits per type.
        limits: Vec<usize>,
    },
}
