//! taskledger CLI - a shared dependency-ordered task ledger.

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use taskledger::{Backend, Client, Daemon, DaemonConfig, Ledger, Request, Response, Status, Task, is_daemon_running};

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskledger")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("taskledger.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_root_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn format_status(status: &Status) -> ColoredString {
    match status {
        Status::Pending => "pending".green(),
        Status::InProgress => "in_progress".yellow(),
        Status::Completed => "completed".blue(),
    }
}

fn print_task_line(task: &Task) {
    let deps = if task.dependencies.is_empty() {
        String::new()
    } else {
        format!(" <- {}", task.dependencies.iter().cloned().collect::<Vec<_>>().join(", "))
    };
    let owner = task
        .assigned_to
        .as_ref()
        .map(|o| format!(" @{}", o))
        .unwrap_or_default();
    println!(
        "{} {} {}{}{}",
        format_status(&task.status),
        task.id.cyan(),
        task.description,
        owner.yellow(),
        deps.dimmed()
    );
}

fn print_task_details(task: &Task) {
    println!("{}: {}", "ID".bold(), task.id.cyan());
    println!("{}: {}", "Description".bold(), task.description);
    println!("{}: {}", "Status".bold(), format_status(&task.status));
    if !task.dependencies.is_empty() {
        let deps: Vec<&str> = task.dependencies.iter().map(String::as_str).collect();
        println!("{}: {}", "Dependencies".bold(), deps.join(", "));
    }
    if let Some(owner) = &task.assigned_to {
        println!("{}: {}", "Assigned To".bold(), owner);
    }
    if let Some(result) = &task.result {
        println!("{}: {}", "Result".bold(), result);
    }
    println!("{}: {}", "Created".bold(), task.created_at);
    println!("{}: {}", "Updated".bold(), task.updated_at);
    if let Some(completed_at) = &task.completed_at {
        println!("{}: {}", "Completed".bold(), completed_at);
    }
}

/// Run a request against the daemon if one serves `root`, otherwise directly.
fn execute(root: &Path, backend: Backend, request: Request) -> Result<Response> {
    if is_daemon_running(root) {
        let mut client = Client::connect(root, None).context("Failed to connect to daemon")?;
        return client.send(&request);
    }

    let mut ledger = Ledger::open(root, backend).context("Failed to open ledger")?;
    Ok(ledger.execute(request))
}

fn expect_task(response: Response) -> Result<Task> {
    match response {
        Response::Task { task } => Ok(task),
        Response::Error { message, .. } => bail!("{}", message),
        other => bail!("Unexpected response: {:?}", other),
    }
}

fn expect_tasks(response: Response) -> Result<Vec<Task>> {
    match response {
        Response::Tasks { tasks } => Ok(tasks),
        Response::Error { message, .. } => bail!("{}", message),
        other => bail!("Unexpected response: {:?}", other),
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = get_root_dir(&cli);
    let backend = cli.backend;

    match cli.command {
        Command::Create {
            id,
            description,
            dependencies,
        } => {
            let task = expect_task(execute(
                &root,
                backend,
                Request::CreateTask {
                    id,
                    description,
                    dependencies,
                },
            )?)
            .context("Failed to create task")?;

            println!("{} Created: {} {}", "✓".green(), task.id.cyan(), task.description);
        }

        Command::Update {
            id,
            description,
            dependencies,
            clear_deps,
        } => {
            let dependencies = if clear_deps { Some(Vec::new()) } else { dependencies };
            let task = expect_task(execute(
                &root,
                backend,
                Request::UpdateTask {
                    task_id: id,
                    description,
                    dependencies,
                },
            )?)
            .context("Failed to update task")?;

            println!("{} Updated: {} {}", "✓".green(), task.id.cyan(), task.description);
        }

        Command::Delete { id } => match execute(&root, backend, Request::DeleteTask { task_id: id })? {
            Response::Deleted { task_id } => println!("{} Deleted: {}", "✓".green(), task_id.cyan()),
            Response::Error { message, .. } => bail!("Failed to delete task: {}", message),
            other => bail!("Unexpected response: {:?}", other),
        },

        Command::Next { instance } => {
            match execute(&root, backend, Request::GetNextTask { instance_id: instance })? {
                Response::Task { task } => {
                    println!("{} Assigned: {} {}", "→".blue(), task.id.cyan(), task.description);
                }
                Response::NoTaskAvailable => println!("{}", "No tasks available".dimmed()),
                Response::Error { message, .. } => bail!("Failed to get next task: {}", message),
                other => bail!("Unexpected response: {:?}", other),
            }
        }

        Command::Complete { id, instance, result } => {
            let request = Request::CompleteTask {
                task_id: id,
                instance_id: instance,
                result,
            };
            match execute(&root, backend, request)? {
                Response::Completed {
                    completed_task,
                    unlocked_tasks,
                } => {
                    println!("{} Completed: {}", "✓".green(), completed_task.id.cyan());
                    for task in unlocked_tasks {
                        println!("  {} Unlocked: {} {}", "→".blue(), task.id.cyan(), task.description);
                    }
                }
                Response::Error { message, .. } => bail!("Failed to complete task: {}", message),
                other => bail!("Unexpected response: {:?}", other),
            }
        }

        Command::Status { status: status_filter } => {
            let tasks = expect_tasks(execute(&root, backend, Request::GetTaskStatus)?).context("Failed to list tasks")?;
            let tasks: Vec<Task> = tasks
                .into_iter()
                .filter(|t| status_filter.is_none_or(|s| t.status == s))
                .collect();

            if tasks.is_empty() {
                println!("{}", "No tasks found".dimmed());
            } else {
                for task in &tasks {
                    print_task_line(task);
                }
            }
        }

        Command::Show { id } => {
            let task = expect_task(execute(&root, backend, Request::GetTaskDetails { task_id: id })?)
                .context("Failed to get task")?;
            print_task_details(&task);
        }

        Command::Available => {
            let tasks = expect_tasks(execute(&root, backend, Request::GetAvailableTasks)?)
                .context("Failed to get available tasks")?;

            if tasks.is_empty() {
                println!("{}", "No available tasks".dimmed());
            } else {
                println!("{} {} task(s) ready to claim:", "→".blue(), tasks.len());
                for task in tasks {
                    println!("  {} {}", task.id.cyan(), task.description);
                }
            }
        }

        Command::Blocked => {
            let tasks = expect_tasks(execute(&root, backend, Request::GetBlockedTasks)?)
                .context("Failed to get blocked tasks")?;

            if tasks.is_empty() {
                println!("{}", "No blocked tasks".dimmed());
            } else {
                println!("{} {} task(s) blocked:", "⊘".red(), tasks.len());
                for task in &tasks {
                    print_task_line(task);
                }
            }
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), root.display());

            let config = DaemonConfig::new(&root).with_backend(backend);
            let mut daemon = Daemon::new(config).context("Failed to create daemon")?;

            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&root) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&root, None).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&root) {
                println!("{} Daemon is running", "✓".green());

                if let Ok(mut client) = Client::connect(&root, None)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
