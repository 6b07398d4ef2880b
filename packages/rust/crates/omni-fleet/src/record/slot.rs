//! One worker thread's last reported state.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Copy of a thread slot taken under its lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSnapshot<S> {
    /// Last state the thread reported.
    pub last_state: S,
    /// Time (seconds) `last_state` last changed value.
    pub last_change: u64,
}

#[derive(Debug)]
pub(crate) struct ThreadSlot<S> {
    inner: Mutex<ThreadSnapshot<S>>,
}

impl<S: Clone + PartialEq + Default> ThreadSlot<S> {
    pub(crate) fn new(created_at: u64) -> Self {
        Self {
            inner: Mutex::new(ThreadSnapshot {
                last_state: S::default(),
                last_change: created_at,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThreadSnapshot<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `state` if it differs from the last one. Returns whether it changed.
    pub(crate) fn update(&self, state: &S, now: u64) -> bool {
        let mut slot = self.lock();
        if slot.last_state == *state {
            return false;
        }
        slot.last_state = state.clone();
        slot.last_change = slot.last_change.max(now);
        true
    }

    pub(crate) fn snapshot(&self) -> ThreadSnapshot<S> {
        self.lock().clone()
    }
}
