// Validation of the front end's bind target, done before anything is started.

use crate::listeners::check_bindable;
use std::net::{IpAddr, SocketAddr};
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors that stop the process before it starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid IP address: '{0}'")]
    InvalidIp(String),

    #[error("Invalid port: '{0}' (expected an integer between 1 and 65535)")]
    InvalidPort(String),

    #[error("Invalid port: cannot bind {addr}: {source}")]
    Unbindable {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to locate the server executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("Failed to spawn resize host: {0}")]
    SpawnBackend(#[source] std::io::Error),

    #[error("Resize host exited during startup ({0})")]
    BackendExited(ExitStatus),

    #[error("Resize host did not accept connections on {addr} within {timeout:?}")]
    BackendNotReady { addr: SocketAddr, timeout: Duration },

    #[error("Failed to check on resize host: {0}")]
    BackendStatus(#[source] std::io::Error),

    #[error("Failed to bind HTTP listener on {addr}: {source}")]
    Listener {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

pub fn parse_ip(value: &str) -> Result<IpAddr, StartupError> {
    value
        .parse()
        .map_err(|_| StartupError::InvalidIp(value.to_string()))
}

pub fn parse_port(value: &str) -> Result<u16, StartupError> {
    match value.parse::<i64>() {
        Ok(port) if (1..=i64::from(u16::MAX)).contains(&port) => Ok(port as u16),
        _ => Err(StartupError::InvalidPort(value.to_string())),
    }
}

/// Parses the listening address and checks that it can actually be bound,
/// releasing it again straight away.
pub fn validate_listen_address(ip: &str, port: &str) -> Result<SocketAddr, StartupError> {
    let addr = SocketAddr::new(parse_ip(ip)?, parse_port(port)?);
    check_bindable(addr).map_err(|source| StartupError::Unbindable { addr, source })?;
    Ok(addr)
}
