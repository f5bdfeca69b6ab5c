//! Client for connecting to the ledger daemon.

use crate::daemon::{DaemonConfig, is_daemon_running, start_daemon};
use crate::ledger::Completion;
use crate::protocol::{Request, Response};
use crate::storage::Backend;
use crate::types::Task;
use eyre::{Context, Result, bail};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client for communicating with the ledger daemon.
pub struct Client {
    root: PathBuf,
    stream: UnixStream,
}

impl Client {
    /// Connect to the daemon, optionally auto-starting it if not running.
    pub fn connect(root: &Path, auto_start: Option<Backend>) -> Result<Self> {
        let config = DaemonConfig::new(root);
        let socket_path = config.socket_path();

        let stream = match (UnixStream::connect(&socket_path), auto_start) {
            (Ok(stream), _) => stream,
            (Err(_), Some(backend)) => {
                if !is_daemon_running(root) {
                    start_daemon(root, backend).context("Failed to auto-start daemon")?;

                    // Wait for daemon to be ready
                    let mut attempts = 0;
                    loop {
                        if attempts > 20 {
                            bail!("Daemon failed to start in time");
                        }
                        std::thread::sleep(Duration::from_millis(50));
                        if let Ok(stream) = UnixStream::connect(&socket_path) {
                            break stream;
                        }
                        attempts += 1;
                    }
                } else {
                    UnixStream::connect(&socket_path).context("Failed to connect to daemon")?
                }
            }
            (Err(e), None) => {
                bail!("Failed to connect to daemon: {}. Is it running?", e);
            }
        };

        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;

        Ok(Self {
            root: root.to_path_buf(),
            stream,
        })
    }

    /// Get the ledger root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Send a request and receive the raw response.
    pub fn send(&mut self, request: &Request) -> Result<Response> {
        let request_json = serde_json::to_string(request)?;
        writeln!(self.stream, "{}", request_json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;
        if response_line.is_empty() {
            bail!("Daemon closed the connection");
        }

        let response: Response = serde_json::from_str(&response_line).context("Failed to parse response")?;
        Ok(response)
    }

    fn expect_task(&mut self, request: Request) -> Result<Task> {
        match self.send(&request)? {
            Response::Task { task } => Ok(task),
            Response::Error { message, .. } => bail!("{}", message),
            other => bail!("Unexpected response to {}: {:?}", request.op(), other),
        }
    }

    fn expect_tasks(&mut self, request: Request) -> Result<Vec<Task>> {
        match self.send(&request)? {
            Response::Tasks { tasks } => Ok(tasks),
            Response::Error { message, .. } => bail!("{}", message),
            other => bail!("Unexpected response to {}: {:?}", request.op(), other),
        }
    }

    /// Create a new task.
    pub fn create_task(&mut self, id: &str, description: &str, dependencies: &[String]) -> Result<Task> {
        self.expect_task(Request::CreateTask {
            id: id.to_string(),
            description: description.to_string(),
            dependencies: Some(dependencies.to_vec()),
        })
    }

    /// Update a pending task.
    pub fn update_task(&mut self, task_id: &str, description: Option<&str>, dependencies: Option<&[String]>) -> Result<Task> {
        self.expect_task(Request::UpdateTask {
            task_id: task_id.to_string(),
            description: description.map(String::from),
            dependencies: dependencies.map(|d| d.to_vec()),
        })
    }

    /// Delete a task. Returns the deleted id.
    pub fn delete_task(&mut self, task_id: &str) -> Result<String> {
        match self.send(&Request::DeleteTask {
            task_id: task_id.to_string(),
        })? {
            Response::Deleted { task_id } => Ok(task_id),
            Response::Error { message, .. } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Claim the next available task, if any.
    pub fn get_next_task(&mut self, instance_id: &str) -> Result<Option<Task>> {
        match self.send(&Request::GetNextTask {
            instance_id: instance_id.to_string(),
        })? {
            Response::Task { task } => Ok(Some(task)),
            Response::NoTaskAvailable => Ok(None),
            Response::Error { message, .. } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Complete a claimed task.
    pub fn complete_task(&mut self, task_id: &str, instance_id: &str, result: &str) -> Result<Completion> {
        match self.send(&Request::CompleteTask {
            task_id: task_id.to_string(),
            instance_id: instance_id.to_string(),
            result: result.to_string(),
        })? {
            Response::Completed {
                completed_task,
                unlocked_tasks,
            } => Ok(Completion {
                completed_task,
                unlocked_tasks,
            }),
            Response::Error { message, .. } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// List every task.
    pub fn get_task_status(&mut self) -> Result<Vec<Task>> {
        self.expect_tasks(Request::GetTaskStatus)
    }

    /// Fetch one task.
    pub fn get_task_details(&mut self, task_id: &str) -> Result<Task> {
        self.expect_task(Request::GetTaskDetails {
            task_id: task_id.to_string(),
        })
    }

    /// List tasks ready to be claimed.
    pub fn get_available_tasks(&mut self) -> Result<Vec<Task>> {
        self.expect_tasks(Request::GetAvailableTasks)
    }

    /// List pending tasks still waiting on dependencies.
    pub fn get_blocked_tasks(&mut self) -> Result<Vec<Task>> {
        self.expect_tasks(Request::GetBlockedTasks)
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.send(&Request::Shutdown)? {
            Response::Ok => Ok(()),
            Response::Error { message, .. } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        match self.send(&Request::Ping)? {
            Response::Pong => Ok(()),
            Response::Error { message, .. } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_connect_without_daemon_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = Client::connect(temp_dir.path(), None);
        assert!(result.is_err());
    }
}
