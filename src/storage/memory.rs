//! In-memory task store (non-persistent).
//!
//! Clones share one snapshot, so a handle kept outside a `Ledger` sees what
//! the ledger saved.

use super::TaskStore;
use crate::error::{LedgerError, Result};
use crate::types::Snapshot;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: Snapshot,
    saves: usize,
    fail_saves: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self::from_state(MemoryState {
            snapshot,
            ..MemoryState::default()
        })
    }

    /// Make every subsequent save fail with `StorageUnavailable`.
    pub fn failing() -> Self {
        Self::from_state(MemoryState {
            fail_saves: true,
            ..MemoryState::default()
        })
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        self.lock().saves
    }

    /// Copy of the last saved snapshot.
    pub fn saved(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    fn from_state(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    // Writes replace whole fields, so a poisoned lock still holds consistent state
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for MemoryStore {
    fn load(&mut self) -> Result<Snapshot> {
        Ok(self.lock().snapshot.clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(LedgerError::StorageUnavailable("memory store rejects writes".to_string()));
        }
        state.snapshot = snapshot.clone();
        state.saves += 1;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
