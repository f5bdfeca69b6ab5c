//! Error taxonomy for ledger operations.

use crate::types::{Status, ValidationError};
use serde::{Deserialize, Serialize};

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// A task with this id already exists.
    DuplicateId(String),
    /// A dependency references a task that does not exist.
    DependencyNotFound { task_id: String, dependency: String },
    /// The dependency set would make a task reachable from itself.
    CycleDetected { task_id: String },
    /// Task not found.
    TaskNotFound(String),
    /// The operation is not allowed in the task's current status.
    InvalidState { task_id: String, status: Status },
    /// The caller does not hold the task.
    NotOwner {
        task_id: String,
        instance_id: String,
        assigned_to: Option<String>,
    },
    /// Other tasks still depend on this one.
    HasDependents { task_id: String, dependents: Vec<String> },
    /// Persisted content could not be parsed.
    StorageCorrupt(String),
    /// Persisted content could not be read or written.
    StorageUnavailable(String),
    /// The request named an operation that does not exist.
    UnknownOperation(String),
    /// The request was malformed (missing or ill-typed fields).
    InvalidRequest(String),
    /// Field validation error.
    Validation(ValidationError),
}

/// Machine-readable error category carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateId,
    DependencyNotFound,
    CycleDetected,
    TaskNotFound,
    InvalidState,
    NotOwner,
    HasDependents,
    StorageCorrupt,
    StorageUnavailable,
    UnknownOperation,
    InvalidRequest,
    Validation,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::DuplicateId(_) => ErrorKind::DuplicateId,
            LedgerError::DependencyNotFound { .. } => ErrorKind::DependencyNotFound,
            LedgerError::CycleDetected { .. } => ErrorKind::CycleDetected,
            LedgerError::TaskNotFound(_) => ErrorKind::TaskNotFound,
            LedgerError::InvalidState { .. } => ErrorKind::InvalidState,
            LedgerError::NotOwner { .. } => ErrorKind::NotOwner,
            LedgerError::HasDependents { .. } => ErrorKind::HasDependents,
            LedgerError::StorageCorrupt(_) => ErrorKind::StorageCorrupt,
            LedgerError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            LedgerError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            LedgerError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            LedgerError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// True for failures of the backing store: unreadable content on load, or a failed read or write.
    pub fn is_storage(&self) -> bool {
        matches!(self, LedgerError::StorageCorrupt(_) | LedgerError::StorageUnavailable(_))
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::DuplicateId(id) => write!(f, "task already exists: {}", id),
            LedgerError::DependencyNotFound { task_id, dependency } => {
                write!(f, "dependency of {} not found: {}", task_id, dependency)
            }
            LedgerError::CycleDetected { task_id } => {
                write!(f, "dependencies of {} would create a cycle", task_id)
            }
            LedgerError::TaskNotFound(id) => write!(f, "task not found: {}", id),
            LedgerError::InvalidState { task_id, status } => {
                write!(f, "task {} cannot be changed while {}", task_id, status)
            }
            LedgerError::NotOwner {
                task_id,
                instance_id,
                assigned_to,
            } => match assigned_to {
                Some(owner) => write!(f, "task {} is assigned to {}, not {}", task_id, owner, instance_id),
                None => write!(f, "task {} is not assigned to {}", task_id, instance_id),
            },
            LedgerError::HasDependents { task_id, dependents } => {
                write!(f, "task {} is required by: {}", task_id, dependents.join(", "))
            }
            LedgerError::StorageCorrupt(msg) => write!(f, "storage corrupt: {}", msg),
            LedgerError::StorageUnavailable(msg) => write!(f, "storage unavailable: {}", msg),
            LedgerError::UnknownOperation(op) => write!(f, "unknown operation: {}", op),
            LedgerError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            LedgerError::Validation(e) => write!(f, "validation error: {}", e),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        LedgerError::Validation(e)
    }
}

/// Result alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
