//! Shared test infrastructure for taskledger integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use taskledger::{Backend, Completion, Ledger, Status, Task};
use tempfile::TempDir;

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub backend: Backend,
    pub ledger: Ledger,
}

impl TestEnv {
    /// Create a new test environment backed by the JSON file store.
    pub fn new() -> Self {
        Self::with_backend(Backend::Json)
    }

    /// Create a new test environment with the given backend.
    pub fn with_backend(backend: Backend) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let ledger = Ledger::open(temp_dir.path(), backend).expect("Failed to open ledger");
        Self {
            temp_dir,
            backend,
            ledger,
        }
    }

    /// Drop the current ledger and load it again from disk.
    pub fn reopen(&mut self) {
        self.ledger = Ledger::open(self.temp_dir.path(), self.backend).expect("Failed to reopen ledger");
    }

    /// Create a task with no dependencies.
    pub fn create_task(&mut self, id: &str) -> Task {
        self.create_task_with_deps(id, &[])
    }

    /// Create a task depending on `deps`.
    pub fn create_task_with_deps(&mut self, id: &str, deps: &[&str]) -> Task {
        self.ledger
            .create(id, &format!("Task {}", id), &to_ids(deps))
            .expect("Failed to create task")
    }

    /// Claim the next task, expecting one to be available.
    pub fn claim(&mut self, instance: &str) -> Task {
        self.ledger
            .assign_next(instance)
            .expect("Failed to assign task")
            .expect("Expected a task to be available")
    }

    /// Complete a task held by `instance`.
    pub fn complete(&mut self, id: &str, instance: &str) -> Completion {
        self.ledger
            .complete(id, instance, &format!("{} done", id))
            .expect("Failed to complete task")
    }

    /// Claim and complete the next task, returning its id.
    pub fn run_next(&mut self, instance: &str) -> String {
        let task = self.claim(instance);
        self.complete(&task.id, instance);
        task.id
    }

    /// Assert that a task is in the available list.
    pub fn assert_available(&self, id: &str) {
        let available = self.ledger.available();
        assert!(
            available.iter().any(|t| t.id == id),
            "Expected task {} to be available, but it wasn't. Available tasks: {:?}",
            id,
            available.iter().map(|t| &t.id).collect::<Vec<_>>()
        );
    }

    /// Assert that a task is NOT in the available list.
    pub fn assert_not_available(&self, id: &str) {
        let available = self.ledger.available();
        assert!(
            !available.iter().any(|t| t.id == id),
            "Expected task {} to NOT be available, but it was",
            id
        );
    }

    /// Assert that a task is in the blocked list.
    pub fn assert_blocked(&self, id: &str) {
        let blocked = self.ledger.blocked();
        assert!(
            blocked.iter().any(|t| t.id == id),
            "Expected task {} to be blocked, but it wasn't",
            id
        );
    }

    /// Get available task count.
    pub fn available_count(&self) -> usize {
        self.ledger.available().len()
    }

    /// Get all tasks count.
    pub fn total_count(&self) -> usize {
        self.ledger.list(None).len()
    }

    /// Get tasks by status.
    pub fn count_by_status(&self, status: Status) -> usize {
        self.ledger.list(Some(status)).len()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned dependency list from string slices.
pub fn to_ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// Ids of a task list, in order.
pub fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}
