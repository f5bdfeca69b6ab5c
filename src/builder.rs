//! Builder pattern API for creating tasks.

use crate::error::Result;
use crate::ledger::Ledger;
use crate::types::Task;

/// Builder for creating tasks with a fluent API.
///
/// # Example
///
/// ```
/// use taskledger::{Ledger, LedgerBuilderExt};
///
/// let mut ledger = Ledger::in_memory();
/// ledger.build("schema").description("Write the schema").create().unwrap();
/// let api = ledger
///     .build("api")
///     .description("Serve the schema")
///     .depends_on("schema")
///     .create()
///     .unwrap();
/// assert!(api.dependencies.contains("schema"));
/// ```
pub struct TaskBuilder<'a> {
    ledger: &'a mut Ledger,
    id: String,
    description: String,
    dependencies: Vec<String>,
}

impl<'a> TaskBuilder<'a> {
    /// Create a new builder with the given id.
    pub fn new(ledger: &'a mut Ledger, id: impl Into<String>) -> Self {
        Self {
            ledger,
            id: id.into(),
            description: String::new(),
            dependencies: Vec::new(),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a dependency.
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Add multiple dependencies.
    pub fn dependencies(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies.extend(ids.into_iter().map(|id| id.into()));
        self
    }

    /// Create the task.
    pub fn create(self) -> Result<Task> {
        self.ledger.create(&self.id, &self.description, &self.dependencies)
    }
}

/// Extension trait to add builder method to Ledger.
pub trait LedgerBuilderExt {
    /// Start building a new task with the given id.
    fn build(&mut self, id: impl Into<String>) -> TaskBuilder<'_>;
}

impl LedgerBuilderExt for Ledger {
    fn build(&mut self, id: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, id)
    }
}
