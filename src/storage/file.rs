//! JSON document store.

use super::{TASKS_FILE, TaskStore, check_loaded, ledger_dir};
use crate::error::{LedgerError, Result};
use crate::types::Snapshot;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Keeps the snapshot in `<root>/.taskledger/tasks.json`.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: ledger_dir(root).join(TASKS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskStore for JsonFileStore {
    fn load(&mut self) -> Result<Snapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No snapshot at {}, starting empty", self.path.display());
                return Ok(Snapshot::new());
            }
            Err(e) => {
                return Err(LedgerError::StorageUnavailable(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::StorageCorrupt(format!("{}: {}", self.path.display(), e)))?;

        log::debug!("Loaded {} task(s) from {}", snapshot.len(), self.path.display());
        check_loaded(snapshot, &self.path)
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let unavailable = |what: &str, e: std::io::Error| {
            LedgerError::StorageUnavailable(format!("failed to {} {}: {}", what, self.path.display(), e))
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| unavailable("create directory for", e))?;
        }

        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| LedgerError::StorageUnavailable(format!("failed to serialize snapshot: {}", e)))?;

        // Write aside and rename so readers never see a partial document
        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp_path).map_err(|e| unavailable("create temp file for", e))?;
        file.write_all(&json).map_err(|e| unavailable("write", e))?;
        file.sync_all().map_err(|e| unavailable("sync", e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| unavailable("finalize", e))?;

        log::debug!("Saved {} task(s) to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
