// Main entry point for grayscale-server.
// The same binary runs as the HTTP front end, or as the resize host when the
// front end re-executes it with `--mode=backend`.

mod image_codec;
mod listeners;
mod main_process;
mod protocol;
mod resize_host;
mod shutdown_signal;
#[cfg(test)]
mod test_support;

use clap::Parser;
use std::process::ExitCode;
use tracing::Level;

fn main() -> ExitCode {
    // Check if we are running in resize host mode
    if std::env::args().any(|arg| arg == "--mode=backend") {
        let config = resize_host::ResizeHostConfig::parse();
        init_tracing(config.log_level);
        return resize_host::run(config);
    }

    let config = main_process::FrontEndConfig::parse();
    init_tracing(config.log_level);
    tracing::info!("Starting grayscale-server...");

    main_process::run(config)
}

// Logs go to stdout for both process roles; the resize host inherits the
// front end's stdout.
fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true) // Include module path in logs
        .with_file(true) // Include source file name
        .with_line_number(true) // Include line numbers
        .init();
}
