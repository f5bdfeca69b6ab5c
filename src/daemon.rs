//! Background daemon serving the ledger over a Unix socket.
//!
//! The daemon provides:
//! - A single owner for the ledger; every request funnels through one loop
//! - One JSON request per line, one JSON response per line
//! - Stale socket/PID cleanup

use crate::ledger::Ledger;
use crate::protocol::{Request, Response};
use crate::storage::{Backend, LEDGER_DIR};
use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::time::interval;

/// Socket file name within the .taskledger directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the .taskledger directory.
const PID_FILE: &str = "daemon.pid";

/// Default interval between shutdown-flag checks when idle.
const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Queue depth between connection handlers and the ledger loop.
const REQUEST_QUEUE_DEPTH: usize = 100;

/// A parsed line (or the reason it could not be parsed) plus where to reply.
type Envelope = (std::result::Result<Request, Response>, mpsc::Sender<Response>);

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory containing .taskledger
    pub root: PathBuf,

    /// Storage backend for the ledger
    pub backend: Backend,

    /// How often the idle loop re-checks for shutdown
    pub tick_interval: Duration,
}

impl DaemonConfig {
    /// Create config with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backend: Backend::default(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }

    /// Use a different storage backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(LEDGER_DIR).join(SOCKET_FILE)
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join(LEDGER_DIR).join(PID_FILE)
    }
}

/// The ledger daemon.
pub struct Daemon {
    config: DaemonConfig,
    ledger: Ledger,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a new daemon instance. Fails if the persisted ledger is corrupt.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let ledger = Ledger::open(&config.root, config.backend).context("Failed to open ledger")?;

        Ok(Self {
            config,
            ledger,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a shutdown handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the daemon until a shutdown request arrives.
    pub async fn run(&mut self) -> Result<()> {
        let ledger_dir = self.config.root.join(LEDGER_DIR);
        fs::create_dir_all(&ledger_dir).context("Failed to create .taskledger directory")?;

        // Clean up any stale socket
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path).ok();
        }

        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string()).context("Failed to write PID file")?;

        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;

        log::info!("Daemon listening on {:?}", socket_path);

        let (tx, mut rx) = mpsc::channel::<Envelope>(REQUEST_QUEUE_DEPTH);

        let shutdown_flag = Arc::clone(&self.shutdown);
        let poll = self.config.tick_interval;
        tokio::spawn(async move {
            Self::accept_connections(listener, tx, shutdown_flag, poll).await;
        });

        let mut tick = interval(self.config.tick_interval);

        loop {
            tokio::select! {
                Some((parsed, response_tx)) = rx.recv() => {
                    let response = self.handle_request(parsed);
                    let _ = response_tx.send(response).await;
                }

                _ = tick.tick() => {}
            }

            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("Daemon shutting down");
                break;
            }
        }

        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();

        Ok(())
    }

    /// Accept connections in a background task.
    ///
    /// Each connection gets its own task; an idle client only parks its own
    /// read, never a runtime worker.
    async fn accept_connections(
        listener: UnixListener,
        tx: mpsc::Sender<Envelope>,
        shutdown: Arc<AtomicBool>,
        poll: Duration,
    ) {
        let mut tick = interval(poll);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let tx_clone = tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, tx_clone).await {
                                log::warn!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },

                _ = tick.tick() => {}
            }

            if shutdown.load(Ordering::Relaxed) {
                break;
            }
        }
    }

    /// Handle a single client connection.
    async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<Envelope>) -> Result<()> {
        let (read_half, mut writer) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.trim().is_empty() {
                continue;
            }

            // Malformed lines get an error response instead of dropping the connection
            let parsed = Request::from_json(&line).map_err(|e| {
                log::warn!("Rejected request: {}", e);
                Response::error(&e)
            });
            let is_shutdown = matches!(parsed, Ok(Request::Shutdown));

            let (resp_tx, mut resp_rx) = mpsc::channel(1);
            tx.send((parsed, resp_tx))
                .await
                .context("Failed to send request to daemon")?;

            if let Some(response) = resp_rx.recv().await {
                let mut response_json = serde_json::to_string(&response)?;
                response_json.push('\n');
                writer.write_all(response_json.as_bytes()).await?;
                writer.flush().await?;
            }

            if is_shutdown {
                break;
            }
        }

        Ok(())
    }

    /// Handle a single request.
    fn handle_request(&mut self, parsed: std::result::Result<Request, Response>) -> Response {
        match parsed {
            Ok(Request::Shutdown) => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::Ok
            }
            Ok(request) => self.ledger.execute(request),
            Err(rejection) => rejection,
        }
    }
}

/// Check if a daemon is running for the given ledger root.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    if !socket_path.exists() {
        return false;
    }

    if let Ok(pid_str) = fs::read_to_string(&pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        // Signal 0 checks existence without delivering anything
        unsafe {
            if libc::kill(pid, 0) == 0 {
                return true;
            }
        }
    }

    // Stale socket, clean up
    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();
    false
}

/// Start the daemon as a background process.
pub fn start_daemon(root: &Path, backend: Backend) -> Result<()> {
    use std::process::Command;

    let exe = std::env::current_exe().context("Failed to get current executable")?;
    let backend = backend.to_string();

    Command::new(exe)
        .args(["--dir", root.to_str().unwrap_or("."), "--backend", backend.as_str(), "daemon"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    // Wait a bit for daemon to start
    std::thread::sleep(Duration::from_millis(100));

    Ok(())
}
