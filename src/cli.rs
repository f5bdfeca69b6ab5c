//! CLI argument parsing for the task ledger.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskledger::{Backend, Status};

#[derive(Parser)]
#[command(
    name = "tl",
    about = "A shared task ledger with dependency-ordered hand-out",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/taskledger/logs/taskledger.log"
)]
pub struct Cli {
    /// Path to the ledger root directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    /// Storage backend
    #[arg(short = 'b', long, global = true, value_enum, default_value_t = Backend::Json)]
    pub backend: Backend,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new task
    Create {
        /// Task ID
        id: String,

        /// Description
        #[arg(short = 'D', long, default_value = "")]
        description: String,

        /// Dependencies (comma-separated task IDs)
        #[arg(short = 'a', long = "after", value_delimiter = ',')]
        dependencies: Option<Vec<String>>,
    },

    /// Update a pending task
    Update {
        /// Task ID
        id: String,

        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Replacement dependencies (comma-separated task IDs)
        #[arg(short = 'a', long = "after", value_delimiter = ',')]
        dependencies: Option<Vec<String>>,

        /// Remove all dependencies
        #[arg(long, conflicts_with = "dependencies")]
        clear_deps: bool,
    },

    /// Delete a task nothing depends on
    Delete {
        /// Task ID
        id: String,
    },

    /// Claim the next available task
    Next {
        /// Instance claiming the task
        instance: String,
    },

    /// Complete a claimed task
    Complete {
        /// Task ID
        id: String,

        /// Instance that holds the task
        instance: String,

        /// Result to record
        #[arg(short, long, default_value = "")]
        result: String,
    },

    /// List tasks
    Status {
        /// Filter by status
        #[arg(short, long, value_enum)]
        status: Option<Status>,
    },

    /// Show a task
    Show {
        /// Task ID
        id: String,
    },

    /// Show tasks that are ready to be claimed
    Available,

    /// Show pending tasks waiting on dependencies
    Blocked,

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
