use tokio::signal;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind};

/// Ctrl-C (SIGINT) and, on unix, SIGTERM listeners.
///
/// On unix the handlers are registered by [`ShutdownSignal::install`], so a
/// signal that arrives before [`ShutdownSignal::recv`] is first awaited is
/// still seen there instead of killing the process.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Option<Signal>,
    #[cfg(unix)]
    terminate: Option<Signal>,
}

impl ShutdownSignal {
    /// Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn install() -> Self {
        Self {
            interrupt: listen(SignalKind::interrupt(), "SIGINT"),
            terminate: listen(SignalKind::terminate(), "SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    pub fn install() -> Self {
        Self {}
    }

    /// Resolves on the next SIGINT or SIGTERM. A signal whose handler could
    /// not be installed never fires.
    #[cfg(unix)]
    pub async fn recv(&mut self) {
        tokio::select! {
            () = next(&mut self.interrupt) => info!("Received Ctrl-C"),
            () = next(&mut self.terminate) => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(unix)]
fn listen(kind: SignalKind, name: &str) -> Option<Signal> {
    signal::unix::signal(kind)
        .inspect_err(|e| error!("Failed to install {} handler: {}", name, e))
        .ok()
}

#[cfg(unix)]
async fn next(signal: &mut Option<Signal>) {
    match signal {
        Some(signal) => {
            if signal.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
