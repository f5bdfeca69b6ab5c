//! SQLite task store.

use super::{DB_FILE, TaskStore, check_loaded, ledger_dir};
use crate::error::{LedgerError, Result};
use crate::types::{Snapshot, Status, Task};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        seq INTEGER NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed')),
        dependencies TEXT NOT NULL,
        assigned_to TEXT,
        result TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        completed_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_tasks_seq ON tasks(seq);
"#;

/// Keeps the snapshot in `<root>/.taskledger/tasks.db`.
///
/// The connection is opened lazily so that loading from an empty root does
/// not create the database file.
pub struct SqliteStore {
    path: PathBuf,
    db: Option<Connection>,
}

impl SqliteStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: ledger_dir(root).join(DB_FILE),
            db: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        if self.db.is_none() {
            if let Some(dir) = self.path.parent() {
                fs::create_dir_all(dir).map_err(|e| {
                    LedgerError::StorageUnavailable(format!("failed to create {}: {}", dir.display(), e))
                })?;
            }
            let db = Connection::open(&self.path).map_err(|e| self.unavailable(e))?;
            db.execute_batch(SCHEMA).map_err(|e| self.corrupt(e))?;
            self.db = Some(db);
        }
        self.db
            .as_mut()
            .ok_or_else(|| LedgerError::StorageUnavailable("database connection unavailable".to_string()))
    }

    fn unavailable(&self, e: rusqlite::Error) -> LedgerError {
        LedgerError::StorageUnavailable(format!("{}: {}", self.path.display(), e))
    }

    fn corrupt(&self, e: impl std::fmt::Display) -> LedgerError {
        LedgerError::StorageCorrupt(format!("{}: {}", self.path.display(), e))
    }
}

/// Raw row as stored; decoded into a `Task` outside the rusqlite closure so
/// decode failures surface as corruption rather than query errors.
struct TaskRow {
    id: String,
    seq: i64,
    description: String,
    status: String,
    dependencies: String,
    assigned_to: Option<String>,
    result: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            seq: row.get(1)?,
            description: row.get(2)?,
            status: row.get(3)?,
            dependencies: row.get(4)?,
            assigned_to: row.get(5)?,
            result: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            completed_at: row.get(9)?,
        })
    }

    fn into_task(self) -> std::result::Result<Task, String> {
        let status = Status::parse(&self.status).ok_or_else(|| format!("unknown status '{}'", self.status))?;
        let dependencies: BTreeSet<String> = serde_json::from_str(&self.dependencies)
            .map_err(|e| format!("bad dependencies for {}: {}", self.id, e))?;
        let seq = u64::try_from(self.seq).map_err(|_| format!("negative seq for {}", self.id))?;

        Ok(Task {
            seq,
            description: self.description,
            status,
            dependencies,
            assigned_to: self.assigned_to,
            result: self.result,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            id: self.id,
        })
    }
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{}': {}", value, e))
}

impl TaskStore for SqliteStore {
    fn load(&mut self) -> Result<Snapshot> {
        if self.db.is_none() && !self.path.exists() {
            log::debug!("No database at {}, starting empty", self.path.display());
            return Ok(Snapshot::new());
        }

        let rows: Vec<TaskRow> = {
            let db = self.connection()?;
            let mut stmt = db
                .prepare(
                    r#"
                    SELECT id, seq, description, status, dependencies, assigned_to, result,
                           created_at, updated_at, completed_at
                    FROM tasks
                    ORDER BY seq ASC
                    "#,
                )
                .map_err(|e| LedgerError::StorageCorrupt(e.to_string()))?;
            let mapped = stmt
                .query_map([], TaskRow::from_row)
                .map_err(|e| LedgerError::StorageCorrupt(e.to_string()))?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| LedgerError::StorageCorrupt(e.to_string()))?
        };

        let mut snapshot = Snapshot::new();
        for row in rows {
            let task = row.into_task().map_err(|e| self.corrupt(e))?;
            snapshot.insert(task);
        }

        log::debug!("Loaded {} task(s) from {}", snapshot.len(), self.path.display());
        check_loaded(snapshot, &self.path)
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let path = self.path.clone();
        let unavailable = |e: rusqlite::Error| LedgerError::StorageUnavailable(format!("{}: {}", path.display(), e));

        let db = self.connection()?;
        let tx = db.transaction().map_err(unavailable)?;
        tx.execute("DELETE FROM tasks", []).map_err(unavailable)?;

        for task in snapshot.ordered() {
            let dependencies = serde_json::to_string(&task.dependencies)
                .map_err(|e| LedgerError::StorageUnavailable(format!("failed to serialize dependencies: {}", e)))?;
            let seq = i64::try_from(task.seq)
                .map_err(|_| LedgerError::StorageUnavailable(format!("seq out of range for {}", task.id)))?;

            tx.execute(
                r#"
                INSERT INTO tasks (id, seq, description, status, dependencies, assigned_to, result,
                                   created_at, updated_at, completed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    task.id,
                    seq,
                    task.description,
                    task.status.as_str(),
                    dependencies,
                    task.assigned_to,
                    task.result,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                    task.completed_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .map_err(unavailable)?;
        }

        tx.commit().map_err(unavailable)?;
        log::debug!("Saved {} task(s) to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
