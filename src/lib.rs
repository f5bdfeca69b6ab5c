//! taskledger: a shared task ledger with dependency-ordered hand-out.
//!
//! Many worker instances share one set of tasks. Each task may depend on
//! others; a task is handed out only once all of its dependencies are
//! completed. The ledger keeps the dependency graph acyclic, tracks which
//! instance owns each in-progress task, and persists the whole snapshot
//! after every mutation.
//!
//! # Example
//!
//! ```
//! use taskledger::{Ledger, Status};
//!
//! let mut ledger = Ledger::in_memory();
//!
//! ledger.create("schema", "Write the schema", &[]).unwrap();
//! ledger.create("api", "Serve the schema", &["schema".to_string()]).unwrap();
//!
//! // Only the task with no open dependencies is handed out
//! let task = ledger.assign_next("worker-1").unwrap().unwrap();
//! assert_eq!(task.id, "schema");
//! assert!(ledger.assign_next("worker-2").unwrap().is_none());
//!
//! // Completing it unlocks its dependents
//! let done = ledger.complete("schema", "worker-1", "ok").unwrap();
//! assert_eq!(done.completed_task.status, Status::Completed);
//! assert_eq!(done.unlocked_tasks[0].id, "api");
//! ```

mod builder;
mod dispatch;
mod error;
mod ledger;
mod types;

pub mod client;
pub mod daemon;
pub mod graph;
pub mod protocol;
pub mod storage;

// Re-export public API
pub use builder::{LedgerBuilderExt, TaskBuilder};
pub use client::Client;
pub use daemon::{Daemon, DaemonConfig, is_daemon_running, start_daemon};
pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::{Completion, Ledger};
pub use protocol::{Request, Response};
pub use storage::{Backend, JsonFileStore, MemoryStore, SqliteStore, TaskStore, open_store};
pub use types::{MAX_ID_LEN, Snapshot, Status, Task, ValidationError, validate_instance_id, validate_task_id};
