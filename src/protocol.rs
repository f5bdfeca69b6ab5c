//! Request/response types for the ledger's named operations.
//!
//! Messages are JSON objects, one per line. Requests carry their operation
//! name in `op`; responses carry their shape in `type`.

use crate::error::{ErrorKind, LedgerError};
use crate::types::Task;
use serde::{Deserialize, Serialize};

/// Request sent to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Create a new task.
    CreateTask {
        id: String,
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dependencies: Option<Vec<String>>,
    },

    /// Update a pending task.
    UpdateTask {
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dependencies: Option<Vec<String>>,
    },

    /// Delete a task nothing depends on.
    DeleteTask { task_id: String },

    /// Claim the next available task.
    GetNextTask { instance_id: String },

    /// Complete a claimed task.
    CompleteTask {
        task_id: String,
        instance_id: String,
        result: String,
    },

    /// List every task.
    GetTaskStatus,

    /// Fetch one task.
    GetTaskDetails { task_id: String },

    /// List tasks ready to be claimed.
    GetAvailableTasks,

    /// List pending tasks still waiting on dependencies.
    GetBlockedTasks,

    /// Check that the server is alive.
    Ping,

    /// Stop the server.
    Shutdown,
}

impl Request {
    /// Every operation name accepted in `op`.
    pub const OPERATIONS: &'static [&'static str] = &[
        "create_task",
        "update_task",
        "delete_task",
        "get_next_task",
        "complete_task",
        "get_task_status",
        "get_task_details",
        "get_available_tasks",
        "get_blocked_tasks",
        "ping",
        "shutdown",
    ];

    /// Parse one request line.
    ///
    /// An `op` outside [`Request::OPERATIONS`] is `UnknownOperation`; anything
    /// else that fails to decode is `InvalidRequest`.
    pub fn from_json(line: &str) -> Result<Self, LedgerError> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| LedgerError::InvalidRequest(e.to_string()))?;

        let op = value
            .get("op")
            .ok_or_else(|| LedgerError::InvalidRequest("missing field `op`".to_string()))?
            .as_str()
            .ok_or_else(|| LedgerError::InvalidRequest("`op` must be a string".to_string()))?;

        if !Self::OPERATIONS.contains(&op) {
            return Err(LedgerError::UnknownOperation(op.to_string()));
        }

        serde_json::from_value(value).map_err(|e| LedgerError::InvalidRequest(e.to_string()))
    }

    /// Operation name as it appears on the wire.
    pub fn op(&self) -> &'static str {
        match self {
            Request::CreateTask { .. } => "create_task",
            Request::UpdateTask { .. } => "update_task",
            Request::DeleteTask { .. } => "delete_task",
            Request::GetNextTask { .. } => "get_next_task",
            Request::CompleteTask { .. } => "complete_task",
            Request::GetTaskStatus => "get_task_status",
            Request::GetTaskDetails { .. } => "get_task_details",
            Request::GetAvailableTasks => "get_available_tasks",
            Request::GetBlockedTasks => "get_blocked_tasks",
            Request::Ping => "ping",
            Request::Shutdown => "shutdown",
        }
    }

    /// True for operations that change the ledger.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Request::CreateTask { .. }
                | Request::UpdateTask { .. }
                | Request::DeleteTask { .. }
                | Request::GetNextTask { .. }
                | Request::CompleteTask { .. }
        )
    }
}

/// Response returned by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Single task response.
    Task { task: Task },

    /// Multiple tasks response.
    Tasks { tasks: Vec<Task> },

    /// A task was deleted.
    Deleted { task_id: String },

    /// `get_next_task` found nothing to hand out.
    NoTaskAvailable,

    /// A task was completed.
    Completed {
        completed_task: Task,
        unlocked_tasks: Vec<Task>,
    },

    /// Operation succeeded.
    Ok,

    /// Pong response to ping.
    Pong,

    /// Error response.
    Error { kind: ErrorKind, message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(err: &LedgerError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<LedgerError> for Response {
    fn from(err: LedgerError) -> Self {
        Response::error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let req = Request::CreateTask {
            id: "a".to_string(),
            description: "first".to_string(),
            dependencies: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "create_task");
        assert!(json.get("dependencies").is_none());
    }

    #[test]
    fn test_parse_create_without_dependencies() {
        let req = Request::from_json(r#"{"op":"create_task","id":"a","description":"d"}"#).unwrap();
        assert_eq!(
            req,
            Request::CreateTask {
                id: "a".to_string(),
                description: "d".to_string(),
                dependencies: None
            }
        );
    }

    #[test]
    fn test_parse_unit_operations() {
        assert_eq!(Request::from_json(r#"{"op":"get_task_status"}"#).unwrap(), Request::GetTaskStatus);
        assert_eq!(Request::from_json(r#"{"op":"ping"}"#).unwrap(), Request::Ping);
    }

    #[test]
    fn test_unknown_operation() {
        let err = Request::from_json(r#"{"op":"reassign_task","task_id":"a"}"#).unwrap_err();
        assert_eq!(err, LedgerError::UnknownOperation("reassign_task".to_string()));
    }

    #[test]
    fn test_missing_required_field() {
        let err = Request::from_json(r#"{"op":"complete_task","task_id":"a","instance_id":"w1"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("result"));
    }

    #[test]
    fn test_wrong_field_type() {
        let err = Request::from_json(r#"{"op":"create_task","id":"a","description":"d","dependencies":"b"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_missing_op_and_bad_json() {
        assert_eq!(Request::from_json(r#"{"id":"a"}"#).unwrap_err().kind(), ErrorKind::InvalidRequest);
        assert_eq!(Request::from_json("not json").unwrap_err().kind(), ErrorKind::InvalidRequest);
        assert_eq!(Request::from_json(r#"{"op":7}"#).unwrap_err().kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_operations_list_matches_variants() {
        let requests = [
            Request::CreateTask {
                id: "a".to_string(),
                description: String::new(),
                dependencies: None,
            },
            Request::UpdateTask {
                task_id: "a".to_string(),
                description: None,
                dependencies: None,
            },
            Request::DeleteTask { task_id: "a".to_string() },
            Request::GetNextTask {
                instance_id: "w".to_string(),
            },
            Request::CompleteTask {
                task_id: "a".to_string(),
                instance_id: "w".to_string(),
                result: String::new(),
            },
            Request::GetTaskStatus,
            Request::GetTaskDetails { task_id: "a".to_string() },
            Request::GetAvailableTasks,
            Request::GetBlockedTasks,
            Request::Ping,
            Request::Shutdown,
        ];
        for req in &requests {
            assert!(Request::OPERATIONS.contains(&req.op()));
            let line = serde_json::to_string(req).unwrap();
            assert_eq!(&Request::from_json(&line).unwrap(), req);
        }
        assert_eq!(requests.len(), Request::OPERATIONS.len());
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::error(&LedgerError::TaskNotFound("x".to_string()));
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "task_not_found");
        assert_eq!(json["message"], "task not found: x");

        let json = serde_json::to_value(Response::NoTaskAvailable).unwrap();
        assert_eq!(json["type"], "no_task_available");
    }
}
