//! The task lifecycle manager.
//!
//! `Ledger` owns the canonical snapshot and the store it is persisted to.
//! Every mutation validates against the current snapshot first, applies the
//! change in memory, then saves the whole snapshot. A failed save is reported
//! but does not undo the in-memory change.

use crate::error::{LedgerError, Result};
use crate::graph;
use crate::storage::{Backend, TaskStore, open_store};
use crate::types::{Snapshot, Status, Task, validate_instance_id, validate_task_id};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Outcome of completing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub completed_task: Task,
    pub unlocked_tasks: Vec<Task>,
}

/// The task ledger.
pub struct Ledger {
    store: Box<dyn TaskStore>,
    snapshot: Snapshot,
}

impl Ledger {
    /// Load the snapshot from `store` and take ownership of both.
    ///
    /// Fails with `StorageCorrupt` if the persisted content cannot be parsed.
    pub fn new(mut store: Box<dyn TaskStore>) -> Result<Self> {
        let snapshot = store.load()?;
        log::info!("Ledger loaded with {} task(s)", snapshot.len());
        Ok(Self { store, snapshot })
    }

    /// Open the ledger rooted at `root` with the given backend.
    pub fn open(root: &Path, backend: Backend) -> Result<Self> {
        log::info!("Opening {} ledger at {}", backend, root.display());
        Self::new(open_store(root, backend))
    }

    /// A ledger backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self {
            store: open_store(Path::new("."), Backend::Memory),
            snapshot: Snapshot::new(),
        }
    }

    /// Read-only view of the current snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Whether mutations survive a restart.
    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    /// Create a new pending task.
    pub fn create(&mut self, id: &str, description: &str, dependencies: &[String]) -> Result<Task> {
        validate_task_id(id)?;

        if self.snapshot.contains(id) {
            return Err(LedgerError::DuplicateId(id.to_string()));
        }

        let dependencies: BTreeSet<String> = dependencies.iter().cloned().collect();
        self.check_dependencies(id, &dependencies)?;

        let seq = self
            .snapshot
            .next_seq()
            .ok_or_else(|| LedgerError::StorageCorrupt("task sequence exhausted".to_string()))?;
        let task = Task::new(id, description, dependencies, seq);
        self.snapshot.insert(task.clone());
        log::info!("Created task {} ({} dependencies)", task.id, task.dependencies.len());

        self.persist()?;
        Ok(task)
    }

    /// Replace the description and/or dependencies of a pending task.
    pub fn update(&mut self, task_id: &str, description: Option<&str>, dependencies: Option<&[String]>) -> Result<Task> {
        let existing = self.get(task_id)?;

        if existing.status != Status::Pending {
            return Err(LedgerError::InvalidState {
                task_id: task_id.to_string(),
                status: existing.status,
            });
        }

        let dependencies: Option<BTreeSet<String>> = dependencies.map(|deps| deps.iter().cloned().collect());
        if let Some(deps) = &dependencies {
            self.check_dependencies(task_id, deps)?;
        }

        let updated = Task {
            description: description.map(String::from).unwrap_or(existing.description),
            dependencies: dependencies.unwrap_or(existing.dependencies),
            updated_at: Utc::now(),
            ..existing
        };
        self.snapshot.insert(updated.clone());
        log::info!("Updated task {}", task_id);

        self.persist()?;
        Ok(updated)
    }

    /// Remove a task nothing depends on. The task's own status does not matter.
    pub fn delete(&mut self, task_id: &str) -> Result<Task> {
        if !self.snapshot.contains(task_id) {
            return Err(LedgerError::TaskNotFound(task_id.to_string()));
        }

        let dependents: Vec<String> = graph::dependents_of(task_id, &self.snapshot)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        if !dependents.is_empty() {
            return Err(LedgerError::HasDependents {
                task_id: task_id.to_string(),
                dependents,
            });
        }

        let removed = self
            .snapshot
            .remove(task_id)
            .ok_or_else(|| LedgerError::TaskNotFound(task_id.to_string()))?;
        log::info!("Deleted task {}", task_id);

        self.persist()?;
        Ok(removed)
    }

    /// Claim the next available task for `instance_id`.
    ///
    /// Returns `Ok(None)` when nothing is available.
    pub fn assign_next(&mut self, instance_id: &str) -> Result<Option<Task>> {
        validate_instance_id(instance_id)?;

        let Some(next_id) = graph::find_next_available(&self.snapshot).map(|t| t.id.clone()) else {
            log::debug!("No task available for {}", instance_id);
            return Ok(None);
        };

        let task = self
            .snapshot
            .get_mut(&next_id)
            .ok_or_else(|| LedgerError::TaskNotFound(next_id.clone()))?;
        debug_assert!(task.status.can_transition_to(&Status::InProgress));
        task.status = Status::InProgress;
        task.assigned_to = Some(instance_id.to_string());
        task.updated_at = Utc::now();
        let assigned = task.clone();
        log::info!("Assigned task {} to {}", assigned.id, instance_id);

        self.persist()?;
        Ok(Some(assigned))
    }

    /// Complete a task held by `instance_id` and report what it unlocked.
    pub fn complete(&mut self, task_id: &str, instance_id: &str, result: &str) -> Result<Completion> {
        let existing = self.get(task_id)?;

        if existing.assigned_to.as_deref() != Some(instance_id) {
            return Err(LedgerError::NotOwner {
                task_id: task_id.to_string(),
                instance_id: instance_id.to_string(),
                assigned_to: existing.assigned_to,
            });
        }
        if !existing.status.can_transition_to(&Status::Completed) {
            return Err(LedgerError::InvalidState {
                task_id: task_id.to_string(),
                status: existing.status,
            });
        }

        let now = Utc::now();
        let completed = Task {
            status: Status::Completed,
            result: Some(result.to_string()),
            updated_at: now,
            completed_at: Some(now),
            ..existing
        };
        self.snapshot.insert(completed.clone());

        let unlocked_tasks: Vec<Task> = graph::find_unlocked(task_id, &self.snapshot)
            .into_iter()
            .cloned()
            .collect();
        log::info!(
            "Task {} completed by {}, unlocked {} task(s)",
            task_id,
            instance_id,
            unlocked_tasks.len()
        );

        self.persist()?;
        Ok(Completion {
            completed_task: completed,
            unlocked_tasks,
        })
    }

    /// Get a task by ID.
    pub fn get(&self, task_id: &str) -> Result<Task> {
        self.snapshot
            .get(task_id)
            .cloned()
            .ok_or_else(|| LedgerError::TaskNotFound(task_id.to_string()))
    }

    /// List tasks in creation order with optional status filter.
    pub fn list(&self, status_filter: Option<Status>) -> Vec<Task> {
        self.snapshot
            .ordered()
            .into_iter()
            .filter(|t| status_filter.is_none_or(|s| t.status == s))
            .cloned()
            .collect()
    }

    /// Tasks that are ready to be claimed.
    pub fn available(&self) -> Vec<Task> {
        graph::available(&self.snapshot).into_iter().cloned().collect()
    }

    /// Pending tasks still waiting on dependencies.
    pub fn blocked(&self) -> Vec<Task> {
        graph::blocked(&self.snapshot).into_iter().cloned().collect()
    }

    /// Every dependency must exist, and together they must not close a cycle.
    fn check_dependencies(&self, task_id: &str, dependencies: &BTreeSet<String>) -> Result<()> {
        if let Some(missing) = dependencies.iter().find(|dep| !self.snapshot.contains(dep)) {
            return Err(LedgerError::DependencyNotFound {
                task_id: task_id.to_string(),
                dependency: missing.clone(),
            });
        }

        if graph::has_cycle(task_id, dependencies, &self.snapshot) {
            return Err(LedgerError::CycleDetected {
                task_id: task_id.to_string(),
            });
        }

        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        self.store.save(&self.snapshot).inspect_err(|e| {
            log::warn!("Mutation applied in memory but not persisted: {}", e);
        })
    }
}
