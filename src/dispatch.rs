//! Maps protocol requests onto ledger operations.

use crate::ledger::{Completion, Ledger};
use crate::protocol::{Request, Response};

impl Ledger {
    /// Run one request to completion and describe the outcome.
    ///
    /// Errors come back as `Response::Error`; this never fails. `Shutdown` is
    /// only acknowledged here, stopping is up to the caller.
    pub fn execute(&mut self, request: Request) -> Response {
        let op = request.op();
        if request.is_mutation() {
            log::info!("Executing {}", op);
        } else {
            log::debug!("Executing {}", op);
        }

        let response = match request {
            Request::CreateTask {
                id,
                description,
                dependencies,
            } => match self.create(&id, &description, dependencies.as_deref().unwrap_or_default()) {
                Ok(task) => Response::Task { task },
                Err(e) => Response::error(&e),
            },

            Request::UpdateTask {
                task_id,
                description,
                dependencies,
            } => match self.update(&task_id, description.as_deref(), dependencies.as_deref()) {
                Ok(task) => Response::Task { task },
                Err(e) => Response::error(&e),
            },

            Request::DeleteTask { task_id } => match self.delete(&task_id) {
                Ok(task) => Response::Deleted { task_id: task.id },
                Err(e) => Response::error(&e),
            },

            Request::GetNextTask { instance_id } => match self.assign_next(&instance_id) {
                Ok(Some(task)) => Response::Task { task },
                Ok(None) => Response::NoTaskAvailable,
                Err(e) => Response::error(&e),
            },

            Request::CompleteTask {
                task_id,
                instance_id,
                result,
            } => match self.complete(&task_id, &instance_id, &result) {
                Ok(Completion {
                    completed_task,
                    unlocked_tasks,
                }) => Response::Completed {
                    completed_task,
                    unlocked_tasks,
                },
                Err(e) => Response::error(&e),
            },

            Request::GetTaskStatus => Response::Tasks { tasks: self.list(None) },

            Request::GetTaskDetails { task_id } => match self.get(&task_id) {
                Ok(task) => Response::Task { task },
                Err(e) => Response::error(&e),
            },

            Request::GetAvailableTasks => Response::Tasks {
                tasks: self.available(),
            },

            Request::GetBlockedTasks => Response::Tasks { tasks: self.blocked() },

            Request::Ping => Response::Pong,

            Request::Shutdown => Response::Ok,
        };

        if let Response::Error { message, .. } = &response {
            log::warn!("{} failed: {}", op, message);
        }
        response
    }

    /// Parse and run one request line.
    pub fn execute_line(&mut self, line: &str) -> Response {
        match Request::from_json(line) {
            Ok(request) => self.execute(request),
            Err(e) => {
                log::warn!("Rejected request: {}", e);
                Response::error(&e)
            }
        }
    }
}
