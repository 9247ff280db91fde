use super::dispatch_client::DispatchClient;
use super::startup::{StartupError, validate_listen_address};
use super::supervisor::{BackendOptions, Supervisor};
use super::web::{AppState, create_app};
use crate::image_codec::RasterCodec;
use crate::listeners::create_listener;
use crate::protocol::{DEFAULT_BACKEND_HOST, DEFAULT_BACKEND_PORT};
use crate::shutdown_signal::ShutdownSignal;
use clap::Parser;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::num::{NonZeroU64, NonZeroUsize};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, error, info};

const BACKEND_READY_TIMEOUT: Duration = Duration::from_secs(10);

// Connection tasks still running when the event loop stops are abandoned after this.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Command line arguments for grayscale-server
#[derive(Parser, Debug)]
#[command(author, version, about = "Grayscale image upload server", long_about = None)]
pub struct FrontEndConfig {
    /// IP address to listen on.
    #[arg(short, long, env = "GRAYSCALE_SERVER_IP")]
    ip: String,

    /// Port number to listen on (1-65535).
    #[arg(short, long, env = "GRAYSCALE_SERVER_PORT", allow_hyphen_values = true)]
    port: String,

    /// IP address the resize host listens on.
    #[arg(long, env = "GRAYSCALE_SERVER_BACKEND_HOST", default_value_t = DEFAULT_BACKEND_HOST)]
    backend_host: IpAddr,

    /// Port the resize host listens on.
    #[arg(long, env = "GRAYSCALE_SERVER_BACKEND_PORT", default_value_t = DEFAULT_BACKEND_PORT)]
    backend_port: u16,

    /// Number of resize workers. Defaults to the available parallelism.
    #[arg(long, env = "GRAYSCALE_SERVER_WORKERS")]
    workers: Option<NonZeroUsize>,

    /// Give up on a resize host exchange after this many seconds.
    /// Without it a request waits for the resize host indefinitely.
    #[arg(long, env = "GRAYSCALE_SERVER_DISPATCH_TIMEOUT_SECS")]
    dispatch_timeout_secs: Option<NonZeroU64>,

    /// Answer 503 instead of processing once this many uploads are in progress.
    #[arg(long, env = "GRAYSCALE_SERVER_MAX_CONCURRENT_UPLOADS")]
    max_concurrent_uploads: Option<NonZeroUsize>,

    /// Maximum log level.
    #[arg(long, env = "GRAYSCALE_SERVER_LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,
}

pub fn run(config: FrontEndConfig) -> ExitCode {
    // All request handling shares one event loop thread; pixel work goes to
    // the blocking pool.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("FATAL: Failed to build runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(serve(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    code
}

async fn serve(config: FrontEndConfig) -> ExitCode {
    info!("Front end started with PID: {}", std::process::id());

    // Installed before the resize host exists, so no interrupt can stop the
    // front end while leaving the backend behind.
    let mut shutdown = ShutdownSignal::install();

    let addr = match validate_listen_address(&config.ip, &config.port) {
        Ok(addr) => addr,
        Err(e) => return startup_failed(e),
    };

    let executable = match std::env::current_exe() {
        Ok(executable) => executable,
        Err(e) => return startup_failed(StartupError::CurrentExe(e)),
    };

    let backend_addr = SocketAddr::new(config.backend_host, config.backend_port);
    let mut supervisor = match Supervisor::spawn_backend(&BackendOptions {
        executable,
        addr: backend_addr,
        workers: config.workers,
        log_level: config.log_level,
    }) {
        Ok(supervisor) => supervisor,
        Err(e) => return startup_failed(e),
    };

    let ready = tokio::select! {
        result = supervisor.wait_until_ready(BACKEND_READY_TIMEOUT) => Some(result),
        () = shutdown.recv() => None,
    };
    match ready {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            supervisor.shutdown().await;
            return startup_failed(e);
        }
        None => {
            info!("Shutdown signal received during startup");
            supervisor.shutdown().await;
            return ExitCode::SUCCESS;
        }
    }
    info!(
        "Resize host ready (PID: {})",
        supervisor
            .backend_pid()
            .map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
    );

    let listener = match create_listener(addr) {
        Ok(listener) => listener,
        Err(source) => {
            supervisor.shutdown().await;
            return startup_failed(StartupError::Listener { addr, source });
        }
    };
    info!("Server successfully bound. Listening on {}", addr);

    let dispatcher = DispatchClient::new(backend_addr).with_timeout(
        config
            .dispatch_timeout_secs
            .map(|secs| Duration::from_secs(secs.get())),
    );
    info!("Dispatching resize requests to {}", dispatcher.backend_addr());

    let state = AppState::new(RasterCodec::shared(), dispatcher)
        .with_upload_limit(config.max_concurrent_uploads);

    // Kept outside the select so the HTTP server outlives the resize host.
    let mut server = Box::pin(axum::serve(listener, create_app(state)).into_future());

    let code = tokio::select! {
        result = &mut server => {
            match result {
                Ok(()) => error!("HTTP server stopped unexpectedly"),
                Err(e) => error!("Server run error: {}", e),
            }
            ExitCode::FAILURE
        }
        () = shutdown.recv() => {
            info!("Shutdown signal received");
            ExitCode::SUCCESS
        }
        status = supervisor.backend_exited() => {
            match status {
                Ok(status) => error!("Resize host exited unexpectedly ({})", status),
                Err(e) => error!("Lost track of the resize host: {}", e),
            }
            ExitCode::FAILURE
        }
    };

    // Backend first, then the HTTP server.
    supervisor.shutdown().await;
    drop(server);

    info!("grayscale-server has shut down.");
    code
}

fn startup_failed(error: StartupError) -> ExitCode {
    error!("FATAL: {}", error);
    eprintln!("FATAL: {}. Exiting.", error);
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config =
            FrontEndConfig::try_parse_from(["grayscale-server", "-i", "127.0.0.1", "-p", "8080"])
                .unwrap();

        assert_eq!(config.ip, "127.0.0.1");
        assert_eq!(config.port, "8080");
        assert_eq!(config.backend_host, DEFAULT_BACKEND_HOST);
        assert_eq!(config.backend_port, DEFAULT_BACKEND_PORT);
        assert!(config.workers.is_none());
        assert!(config.dispatch_timeout_secs.is_none());
        assert!(config.max_concurrent_uploads.is_none());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_long_options() {
        let config = FrontEndConfig::try_parse_from([
            "grayscale-server",
            "--ip=::1",
            "--port=8443",
            "--backend-port=9191",
            "--workers=2",
            "--dispatch-timeout-secs=30",
            "--max-concurrent-uploads=16",
            "--log-level=debug",
        ])
        .unwrap();

        assert_eq!(config.ip, "::1");
        assert_eq!(config.backend_port, 9191);
        assert_eq!(config.workers, NonZeroUsize::new(2));
        assert_eq!(config.dispatch_timeout_secs, NonZeroU64::new(30));
        assert_eq!(config.max_concurrent_uploads, NonZeroUsize::new(16));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_out_of_range_port_reaches_validation() {
        // Port range is checked by startup validation so it can exit with 1.
        let config =
            FrontEndConfig::try_parse_from(["grayscale-server", "-i", "0.0.0.0", "-p", "-5"])
                .unwrap();
        assert!(matches!(
            validate_listen_address(&config.ip, &config.port),
            Err(StartupError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_ip_and_port_are_required() {
        assert!(FrontEndConfig::try_parse_from(["grayscale-server", "-p", "8080"]).is_err());
        assert!(FrontEndConfig::try_parse_from(["grayscale-server", "-i", "127.0.0.1"]).is_err());
    }
}
