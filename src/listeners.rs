use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;

const LISTEN_BACKLOG: i32 = 1024;

/// Binds a TCP listener with `SO_REUSEADDR` set, so a restarted process can
/// take the address back right away instead of waiting out TIME_WAIT.
///
/// Must be called from within a Tokio runtime.
pub fn create_listener(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    tracing::info!("Attempting to bind {}...", addr);

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    // Make it non-blocking for tokio
    socket.set_nonblocking(true)?;

    let std_listener: std::net::TcpListener = socket.into();
    tokio::net::TcpListener::from_std(std_listener)
}

/// Checks that `addr` can be bound right now, then releases it.
pub fn check_bindable(addr: SocketAddr) -> std::io::Result<()> {
    let listener = std::net::TcpListener::bind(addr)?;
    drop(listener);
    Ok(())
}
