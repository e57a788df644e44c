// State management module
//
// This module provides the StateManager which wraps ScanState with thread-safe access
// using Arc<RwLock<T>> and emits change events for observers.

use crate::models::{JobState, ScanError, ScanRange, ScanState};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when scan state is modified
///
/// These are observability events for status displays. They go over a
/// broadcast channel and may be dropped for slow subscribers; the scan
/// results themselves travel over the notification channel
/// ([`crate::services::EventSink`]), which never drops.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The job moved between lifecycle states
    JobStateChanged {
        job_id: u64,
        from: JobState,
        to: JobState,
    },

    /// A new range was accepted
    RangeChanged { range: ScanRange },

    /// Another prime was recorded
    ProgressUpdated {
        primes_found: u64,
        last_prime: Option<i64>,
    },

    /// A segment halted on a pause and recorded where to resume
    ResumePositionRecorded { resume_at: i64 },

    /// The job was returned to idle
    StateReset,
}

/// Thread-safe scan state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`ScanState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Runs fallible transitions atomically via [`try_update()`](Self::try_update)
/// - Supports subscribing to state changes via tokio broadcast channels
pub struct StateManager {
    state: Arc<RwLock<ScanState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with idle state and a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ScanState::default())),
            state_tx,
        }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> ScanState {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_busy());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ScanState) -> R,
    {
        let state = self.read_guard();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Returns the events that were emitted.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ScanState),
    {
        let mut state = self.write_guard();
        let old_state = state.clone();

        update_fn(&mut state);

        self.publish(&old_state, &state)
    }

    /// Run a fallible transition while holding the write lock
    ///
    /// The closure sees the state exactly as the last writer left it, so
    /// check-then-act transitions (pause only while running, and so on) cannot
    /// race. Events are emitted for whatever the closure changed, even when
    /// it returns an error.
    pub fn try_update<F, T>(&self, transition: F) -> Result<T, ScanError>
    where
        F: FnOnce(&mut ScanState) -> Result<T, ScanError>,
    {
        let mut state = self.write_guard();
        let old_state = state.clone();

        let result = transition(&mut state);

        self.publish(&old_state, &state);
        result
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn publish(&self, old: &ScanState, new: &ScanState) -> Vec<StateChange> {
        let changes = Self::detect_changes(old, new);

        for change in &changes {
            // Nobody listening is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    fn detect_changes(old: &ScanState, new: &ScanState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.range != new.range {
            if let Some(range) = new.range {
                changes.push(StateChange::RangeChanged { range });
            }
        }

        if old.job_state != new.job_state {
            changes.push(StateChange::JobStateChanged {
                job_id: new.job_id,
                from: old.job_state,
                to: new.job_state,
            });
        }

        if old.primes_found != new.primes_found || old.last_prime != new.last_prime {
            changes.push(StateChange::ProgressUpdated {
                primes_found: new.primes_found,
                last_prime: new.last_prime,
            });
        }

        if new.job_state == JobState::Paused && old.resume_at != new.resume_at {
            if let Some(resume_at) = new.resume_at {
                changes.push(StateChange::ResumePositionRecorded { resume_at });
            }
        }

        if old.job_state != JobState::Idle && new.job_state == JobState::Idle {
            changes.push(StateChange::StateReset);
        }

        changes
    }

    // Nothing panics while holding the lock, but a poisoned lock still holds
    // consistent data, so recover it instead of propagating the panic.
    fn read_guard(&self) -> RwLockReadGuard<'_, ScanState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ScanState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
