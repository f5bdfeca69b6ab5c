//! Task storage with pluggable backends.
//!
//! Supports:
//! - `memory`: in-memory snapshot (non-persistent, for testing)
//! - `json`: single JSON document, rewritten on every save
//! - `sqlite`: one row per task, rewritten in a single transaction

mod file;
mod memory;
mod sqlite;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{LedgerError, Result};
use crate::types::Snapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage directory name.
pub const LEDGER_DIR: &str = ".taskledger";

/// JSON snapshot file.
pub const TASKS_FILE: &str = "tasks.json";

/// SQLite database file.
pub const DB_FILE: &str = "tasks.db";

/// Directory holding the ledger's files under `root`.
pub fn ledger_dir(root: &Path) -> PathBuf {
    root.join(LEDGER_DIR)
}

/// Durable home of the canonical task mapping.
///
/// `save` always receives the full snapshot and replaces whatever was stored
/// before; there is no incremental persistence.
pub trait TaskStore: Send {
    /// Read the persisted snapshot, or an empty one if nothing was saved yet.
    fn load(&mut self) -> Result<Snapshot>;

    /// Replace the persisted snapshot.
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;
}

impl<S: TaskStore + ?Sized> TaskStore for Box<S> {
    fn load(&mut self) -> Result<Snapshot> {
        (**self).load()
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        (**self).save(snapshot)
    }

    fn is_persistent(&self) -> bool {
        (**self).is_persistent()
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Memory,
    #[default]
    Json,
    Sqlite,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Json => write!(f, "json"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Build the store for `backend` rooted at `root`.
pub fn open_store(root: &Path, backend: Backend) -> Box<dyn TaskStore> {
    match backend {
        Backend::Memory => Box::new(MemoryStore::new()),
        Backend::Json => Box::new(JsonFileStore::new(root)),
        Backend::Sqlite => Box::new(SqliteStore::new(root)),
    }
}

/// Validate a freshly decoded snapshot, reporting problems as corruption.
pub(crate) fn check_loaded(snapshot: Snapshot, source: &Path) -> Result<Snapshot> {
    snapshot
        .validate()
        .map_err(|e| LedgerError::StorageCorrupt(format!("{}: {}", source.display(), e)))?;
    Ok(snapshot)
}
