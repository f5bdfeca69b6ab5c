//! Core data types for the task ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Longest accepted task or instance identifier.
pub const MAX_ID_LEN: usize = 128;

/// A unit of work tracked by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Caller-chosen identifier, immutable after creation
    pub id: String,

    /// Free-text description of the work
    pub description: String,

    /// Current lifecycle state
    pub status: Status,

    /// Ids of tasks that must complete before this one becomes available
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<String>,

    /// Instance that claimed the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    /// Outcome reported on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Creation sequence number; the stable order for listing and tie-breaks
    pub seq: u64,

    /// When created
    pub created_at: DateTime<Utc>,

    /// Last modification
    pub updated_at: DateTime<Utc>,

    /// When completed (if status == Completed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

impl Status {
    /// Check if a status transition is valid. The lifecycle only moves forward.
    pub fn can_transition_to(&self, target: &Status) -> bool {
        use Status::*;
        matches!((self, target), (Pending, InProgress) | (InProgress, Completed))
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
        }
    }

    /// Parse a wire name back into a status.
    pub fn parse(value: &str) -> Option<Status> {
        match value {
            "pending" => Some(Status::Pending),
            "in_progress" => Some(Status::InProgress),
            "completed" => Some(Status::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors for task and instance fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyId,
    IdTooLong(String),
    InvalidIdCharacters(String),
    EmptyInstanceId,
    InvalidInstanceId(String),
    AssigneeMismatch(Status),
    ResultMismatch(Status),
    CompletedAtMismatch(Status),
    InvalidTimestamp,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyId => write!(f, "task id cannot be empty"),
            ValidationError::IdTooLong(id) => {
                write!(f, "task id '{}' exceeds {} characters", id, MAX_ID_LEN)
            }
            ValidationError::InvalidIdCharacters(id) => {
                write!(f, "task id '{}' contains whitespace or control characters", id)
            }
            ValidationError::EmptyInstanceId => write!(f, "instance id cannot be empty"),
            ValidationError::InvalidInstanceId(id) => write!(f, "invalid instance id '{}'", id),
            ValidationError::AssigneeMismatch(status) => {
                write!(f, "assignedTo must be set exactly when in_progress or completed (status {})", status)
            }
            ValidationError::ResultMismatch(status) => {
                write!(f, "result must be set exactly when completed (status {})", status)
            }
            ValidationError::CompletedAtMismatch(status) => {
                write!(f, "completedAt must be set exactly when completed (status {})", status)
            }
            ValidationError::InvalidTimestamp => write!(f, "updatedAt cannot be before createdAt"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a caller-supplied task id.
pub fn validate_task_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if id.chars().count() > MAX_ID_LEN {
        return Err(ValidationError::IdTooLong(id.to_string()));
    }
    if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ValidationError::InvalidIdCharacters(id.to_string()));
    }
    Ok(())
}

/// Check a caller-supplied instance id.
pub fn validate_instance_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyInstanceId);
    }
    if id.chars().count() > MAX_ID_LEN || id.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ValidationError::InvalidInstanceId(id.to_string()));
    }
    Ok(())
}

impl Task {
    /// A fresh pending task.
    pub fn new(id: impl Into<String>, description: impl Into<String>, dependencies: BTreeSet<String>, seq: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            description: description.into(),
            status: Status::Pending,
            dependencies,
            assigned_to: None,
            result: None,
            seq,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Validate the task's fields against the lifecycle invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_task_id(&self.id)?;

        // assignedTo iff in_progress or completed
        let claimed = matches!(self.status, Status::InProgress | Status::Completed);
        if self.assigned_to.is_some() != claimed {
            return Err(ValidationError::AssigneeMismatch(self.status));
        }

        // result and completedAt iff completed
        let completed = self.status == Status::Completed;
        if self.result.is_some() != completed {
            return Err(ValidationError::ResultMismatch(self.status));
        }
        if self.completed_at.is_some() != completed {
            return Err(ValidationError::CompletedAtMismatch(self.status));
        }

        if self.updated_at < self.created_at {
            return Err(ValidationError::InvalidTimestamp);
        }

        Ok(())
    }
}

/// The full mapping of task id to task at a given instant.
///
/// Persisted as a flat JSON object keyed by id. Iteration over [`Snapshot::ordered`]
/// follows creation order, never map order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    tasks: BTreeMap<String, Task>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Insert or replace a task under its own id.
    pub fn insert(&mut self, task: Task) -> Option<Task> {
        self.tasks.insert(task.id.clone(), task)
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        self.tasks.remove(id)
    }

    /// Tasks in creation order (seq, then id).
    pub fn ordered(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Sequence number for the next created task, `None` once exhausted.
    pub fn next_seq(&self) -> Option<u64> {
        match self.tasks.values().map(|t| t.seq).max() {
            Some(max) => max.checked_add(1),
            None => Some(0),
        }
    }

    /// Check every task's fields and that no dependency dangles.
    pub fn validate(&self) -> Result<(), String> {
        for (key, task) in &self.tasks {
            if key != &task.id {
                return Err(format!("entry '{}' holds task '{}'", key, task.id));
            }
            task.validate().map_err(|e| format!("task '{}': {}", task.id, e))?;
            if let Some(missing) = task.dependencies.iter().find(|dep| !self.tasks.contains_key(*dep)) {
                return Err(format!("task '{}' depends on unknown task '{}'", task.id, missing));
            }
        }
        if self.next_seq().is_none() {
            return Err("task sequence exhausted".to_string());
        }
        Ok(())
    }
}

impl FromIterator<Task> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for task in iter {
            snapshot.insert(task);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str) -> Task {
        Task::new(id, "Some work", BTreeSet::new(), 0)
    }

    #[test]
    fn test_task_validation_valid() {
        assert!(make_task("build-api").validate().is_ok());
    }

    #[test]
    fn test_task_validation_empty_id() {
        assert_eq!(make_task("").validate(), Err(ValidationError::EmptyId));
    }

    #[test]
    fn test_task_validation_id_too_long() {
        let id = "x".repeat(MAX_ID_LEN + 1);
        assert_eq!(make_task(&id).validate(), Err(ValidationError::IdTooLong(id)));
    }

    #[test]
    fn test_task_validation_whitespace_in_id() {
        assert_eq!(
            make_task("two words").validate(),
            Err(ValidationError::InvalidIdCharacters("two words".to_string()))
        );
    }

    #[test]
    fn test_task_validation_assignee_without_claim() {
        let mut task = make_task("a");
        task.assigned_to = Some("w1".to_string());
        assert_eq!(task.validate(), Err(ValidationError::AssigneeMismatch(Status::Pending)));
    }

    #[test]
    fn test_task_validation_in_progress_without_assignee() {
        let mut task = make_task("a");
        task.status = Status::InProgress;
        assert_eq!(task.validate(), Err(ValidationError::AssigneeMismatch(Status::InProgress)));
    }

    #[test]
    fn test_task_validation_completed_needs_result() {
        let mut task = make_task("a");
        task.status = Status::Completed;
        task.assigned_to = Some("w1".to_string());
        task.completed_at = Some(Utc::now());
        assert_eq!(task.validate(), Err(ValidationError::ResultMismatch(Status::Completed)));

        task.result = Some("ok".to_string());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_instance_id_validation() {
        assert!(validate_instance_id("worker-1").is_ok());
        assert_eq!(validate_instance_id(""), Err(ValidationError::EmptyInstanceId));
        assert!(validate_instance_id("bad\tid").is_err());
    }

    #[test]
    fn test_status_transitions() {
        use Status::*;

        assert!(Pending.can_transition_to(&InProgress));
        assert!(InProgress.can_transition_to(&Completed));

        // Never backwards, never skipping
        assert!(!Pending.can_transition_to(&Completed));
        assert!(!InProgress.can_transition_to(&Pending));
        assert!(!Completed.can_transition_to(&Pending));
        assert!(!Completed.can_transition_to(&InProgress));
        assert!(!Completed.can_transition_to(&Completed));
    }

    #[test]
    fn test_status_wire_names() {
        for status in [Status::Pending, Status::InProgress, Status::Completed] {
            assert_eq!(Status::parse(status.as_str()), Some(status));
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{}\"", status));
        }
        assert_eq!(Status::parse("blocked"), None);
    }

    #[test]
    fn test_status_cli_names_match_wire_names() {
        use clap::ValueEnum;

        for status in Status::value_variants() {
            let name = status.to_possible_value().unwrap();
            assert_eq!(name.get_name(), status.as_str());
            assert_eq!(Status::from_str(status.as_str(), false), Ok(*status));
        }
        assert!(Status::from_str("in-progress", false).is_err());
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let mut task = make_task("a");
        task.status = Status::InProgress;
        task.assigned_to = Some("w1".to_string());
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["assignedTo"], "w1");
        assert_eq!(json["status"], "in_progress");
        assert!(json.get("dependencies").is_none());
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_dependencies_absent_deserializes_empty() {
        let json = r#"{"id":"a","description":"d","status":"pending","seq":3,
            "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(task.dependencies.is_empty());
        assert_eq!(task.seq, 3);
    }

    #[test]
    fn test_snapshot_ordered_by_seq() {
        let snapshot: Snapshot = [
            Task::new("zeta", "", BTreeSet::new(), 0),
            Task::new("alpha", "", BTreeSet::new(), 2),
            Task::new("mid", "", BTreeSet::new(), 1),
        ]
        .into_iter()
        .collect();

        let ids: Vec<&str> = snapshot.ordered().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "mid", "alpha"]);
        assert_eq!(snapshot.next_seq(), Some(3));
    }

    #[test]
    fn test_snapshot_sequence_exhausted() {
        let snapshot: Snapshot = [Task::new("last", "", BTreeSet::new(), u64::MAX)].into_iter().collect();

        assert_eq!(snapshot.next_seq(), None);
        assert!(snapshot.validate().unwrap_err().contains("exhausted"));
        assert_eq!(Snapshot::new().next_seq(), Some(0));
    }

    #[test]
    fn test_snapshot_validate_dangling_dependency() {
        let deps: BTreeSet<String> = ["ghost".to_string()].into();
        let snapshot: Snapshot = [Task::new("a", "", deps, 0)].into_iter().collect();
        let err = snapshot.validate().unwrap_err();
        assert!(err.contains("ghost"));
    }

    #[test]
    fn test_snapshot_serializes_as_flat_map() {
        let snapshot: Snapshot = [make_task("a")].into_iter().collect();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["a"]["id"], "a");
    }
}
