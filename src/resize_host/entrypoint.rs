use super::listener::ResizeHost;
use super::worker_pool::WorkerPool;
use crate::image_codec::RasterCodec;
use crate::protocol::{DEFAULT_BACKEND_HOST, DEFAULT_BACKEND_PORT};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{Level, error, info, warn};

// Blocking work still running at exit (a resize, the stdin reader) is abandoned after this.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Command line of the resize host process. Not meant to be typed by hand;
/// the front end's supervisor builds it.
#[derive(Parser, Debug)]
#[command(author, version, about = "grayscale-server resize host", long_about = None)]
pub struct ResizeHostConfig {
    /// Process role selector; always "backend" here.
    #[arg(long = "mode", hide = true, default_value = "backend", value_parser = ["backend"])]
    _mode: String,

    /// IP address to listen on.
    #[arg(long, env = "GRAYSCALE_SERVER_BACKEND_HOST", default_value_t = DEFAULT_BACKEND_HOST)]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "GRAYSCALE_SERVER_BACKEND_PORT", default_value_t = DEFAULT_BACKEND_PORT)]
    port: u16,

    /// Number of resize workers. Defaults to the available parallelism.
    #[arg(long, env = "GRAYSCALE_SERVER_WORKERS")]
    workers: Option<NonZeroUsize>,

    /// Maximum log level.
    #[arg(long, env = "GRAYSCALE_SERVER_LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Exit once stdin reaches EOF, i.e. when the supervising process is gone.
    #[arg(long, hide = true)]
    exit_on_stdin_eof: bool,
}

pub fn run(config: ResizeHostConfig) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("resize-host")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("FATAL: Failed to build resize host runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(serve(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    code
}

async fn serve(config: ResizeHostConfig) -> ExitCode {
    info!("Resize host started with PID: {}", std::process::id());

    // One pool for the lifetime of the process, shared by every connection.
    let pool = match config.workers {
        Some(workers) => WorkerPool::new(RasterCodec::shared(), workers),
        None => WorkerPool::with_available_parallelism(RasterCodec::shared()),
    };
    info!("Worker pool ready with {} worker(s)", pool.size());

    let addr = SocketAddr::new(config.host, config.port);
    let host = match ResizeHost::bind(addr, pool) {
        Ok(host) => host,
        Err(e) => {
            error!("FATAL: Failed to bind resize host to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Resize host listening on {}", addr);

    let supervisor_gone = async {
        if config.exit_on_stdin_eof {
            wait_for_stdin_eof().await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = host.serve() => {
            error!("Resize host accept loop ended unexpectedly");
            ExitCode::FAILURE
        }
        () = supervisor_gone => {
            warn!("Supervisor is gone (stdin closed), shutting down resize host");
            ExitCode::SUCCESS
        }
        () = ignore_interrupts() => ExitCode::SUCCESS,
    }
}

/// Keeps a terminal Ctrl-C from stopping the resize host on its own;
/// the supervisor decides when it stops.
async fn ignore_interrupts() {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C in resize host: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Resize host ignoring interrupt; waiting for the supervisor");
    }
}

async fn wait_for_stdin_eof() {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 256];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => return,
            Ok(_) => continue,
            Err(e) => {
                warn!("Error reading stdin: {}", e);
                return;
            }
        }
    }
}
