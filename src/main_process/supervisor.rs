// Owns the resize host child process for the front end.
// The backend is started before the HTTP server and always stopped before it.

use super::startup::StartupError;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{Level, debug, error, info, warn};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long `shutdown` waits for the killed backend to be reaped.
pub const BACKEND_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// How the resize host process is launched.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub executable: PathBuf,
    pub addr: SocketAddr,
    pub workers: Option<NonZeroUsize>,
    pub log_level: Level,
}

impl BackendOptions {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("--mode=backend")
            .arg(format!("--host={}", self.addr.ip()))
            .arg(format!("--port={}", self.addr.port()))
            .arg(format!("--log-level={}", self.log_level))
            .arg("--exit-on-stdin-eof");
        if let Some(workers) = self.workers {
            command.arg(format!("--workers={}", workers));
        }

        // stdin stays open for as long as we hold the child; the backend treats
        // its EOF as "supervisor gone".
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Own process group, so a terminal Ctrl-C reaches only the front end
        // and the backend is stopped through `shutdown`.
        #[cfg(unix)]
        command.process_group(0);

        command
    }
}

/// Supervisor of the resize host process.
///
/// Holds the only handle to the child. Running while `backend` is `Some`,
/// stopped once `shutdown` has taken it.
pub struct Supervisor {
    backend: Option<Child>,
    backend_addr: SocketAddr,
}

impl Supervisor {
    /// Starts the resize host. Must be called from within a Tokio runtime.
    pub fn spawn_backend(options: &BackendOptions) -> Result<Self, StartupError> {
        let child = options
            .command()
            .spawn()
            .map_err(StartupError::SpawnBackend)?;

        info!(
            "Resize host spawned with PID: {}",
            child.id().map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
        );

        Ok(Self {
            backend: Some(child),
            backend_addr: options.addr,
        })
    }

    pub fn backend_pid(&self) -> Option<u32> {
        self.backend.as_ref().and_then(Child::id)
    }

    /// Waits until the resize host accepts TCP connections.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<(), StartupError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(child) = self.backend.as_mut() {
                if let Some(status) = child.try_wait().map_err(StartupError::BackendStatus)? {
                    return Err(StartupError::BackendExited(status));
                }
            }

            match TcpStream::connect(self.backend_addr).await {
                Ok(_stream) => {
                    info!("Resize host is accepting connections on {}", self.backend_addr);
                    return Ok(());
                }
                Err(e) => debug!("Resize host not ready yet: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(StartupError::BackendNotReady {
                    addr: self.backend_addr,
                    timeout,
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Resolves when the resize host exits on its own. Never resolves once
    /// the supervisor has stopped it.
    pub async fn backend_exited(&mut self) -> std::io::Result<ExitStatus> {
        match self.backend.as_mut() {
            Some(child) => child.wait().await,
            None => std::future::pending().await,
        }
    }

    /// Kills the resize host and waits, up to [`BACKEND_EXIT_TIMEOUT`], for it
    /// to be reaped so its port is free again. Requests it was handling are lost.
    pub async fn shutdown(&mut self) {
        let Some(mut child) = self.backend.take() else {
            return;
        };

        info!("Stopping resize host (PID: {:?})...", child.id());
        if let Err(e) = child.start_kill() {
            // Already exited; still reap it below.
            debug!("Failed to signal resize host: {}", e);
        }

        match tokio::time::timeout(BACKEND_EXIT_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => info!("Resize host stopped ({})", status),
            Ok(Err(e)) => error!("Error waiting for resize host to exit: {}", e),
            Err(_) => warn!(
                "Resize host did not exit within {:?}; it is killed again when dropped",
                BACKEND_EXIT_TIMEOUT
            ),
        }
    }
}
