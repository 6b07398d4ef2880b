//! Default per-thread payload reported by self-play workers.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Snapshot one worker thread reports in each heartbeat.
///
/// The registry only compares it for equality; the fields mean something to
/// the scheduler, not to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadState {
    /// Thread slot on the worker.
    pub thread_id: i32,
    /// Game sequence number within the thread.
    pub seq: i64,
    /// Move index within the current game.
    pub move_idx: i32,
    /// Model version playing black.
    pub black: i64,
    /// Model version playing white.
    pub white: i64,
}

impl Default for ThreadState {
    fn default() -> Self {
        Self {
            thread_id: -1,
            seq: 0,
            move_idx: -1,
            black: -1,
            white: -1,
        }
    }
}

impl Display for ThreadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[th={}][seq={}][mv={}] b={} w={}",
            self.thread_id, self.seq, self.move_idx, self.black, self.white
        )
    }
}
