// Accept loop of the resize host.
// One task per connection, one request frame in, one response frame out, then close.

use super::worker_pool::WorkerPool;
use crate::listeners::create_listener;
use crate::protocol::{FrameError, ResizeRequestFrame, ResizeResponseFrame};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

// Pause after a failed accept (e.g. out of file descriptors) before retrying.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct ResizeHost {
    listener: TcpListener,
    pool: WorkerPool,
}

impl ResizeHost {
    /// Binds the listening socket. Must be called from within a Tokio runtime.
    pub fn bind(addr: SocketAddr, pool: WorkerPool) -> std::io::Result<Self> {
        let listener = create_listener(addr)?;
        Ok(Self { listener, pool })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process is terminated.
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    tokio::spawn(handle_connection(stream, peer, self.pool.clone()));
                }
                Err(err) => {
                    error!("Failed to accept connection: {}", err);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, pool: WorkerPool) {
    let request = match ResizeRequestFrame::read_from(&mut stream).await {
        Ok(request) => request,
        Err(FrameError::ConnectionClosed) => {
            debug!("{} closed the connection without sending a request", peer);
            return;
        }
        Err(err) => {
            warn!("Failed to read request from {}: {}", peer, err);
            return;
        }
    };

    debug!(
        "Resize request from {}: {} bytes, factor {}",
        peer,
        request.payload.len(),
        request.scale_factor
    );

    // Any worker failure ends the exchange here; the client sees the connection
    // close without a response and other connections carry on.
    let resized = match pool.resize(request.payload, request.scale_factor).await {
        Ok(resized) => resized,
        Err(err) => {
            error!(
                "Resize for {} failed, closing connection without a response: {}",
                peer, err
            );
            return;
        }
    };

    let response = match ResizeResponseFrame::new(resized) {
        Ok(response) => response,
        Err(err) => {
            error!("Cannot send resize result to {}: {}", peer, err);
            return;
        }
    };

    if let Err(err) = response.write_to(&mut stream).await {
        warn!("Failed to send response to {}: {}", peer, err);
        return;
    }

    if let Err(err) = stream.shutdown().await {
        debug!("Error closing connection to {}: {}", peer, err);
    }

    info!(
        "Resized image for {} ({} bytes)",
        peer,
        response.payload.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EchoCodec, PanickyCodec};
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    async fn start_host(pool: WorkerPool) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let host = ResizeHost::bind("127.0.0.1:0".parse().unwrap(), pool).unwrap();
        let addr = host.local_addr().unwrap();
        (addr, tokio::spawn(host.serve()))
    }

    async fn exchange(addr: SocketAddr, payload: Vec<u8>) -> Result<Vec<u8>, FrameError> {
        let mut stream = TcpStream::connect(addr).await?;
        ResizeRequestFrame::new(0.5, payload)?
            .write_to(&mut stream)
            .await?;
        Ok(ResizeResponseFrame::read_from(&mut stream).await?.payload)
    }

    #[tokio::test]
    async fn test_each_connection_gets_one_response() {
        let pool = WorkerPool::new(Arc::new(EchoCodec), NonZeroUsize::new(2).unwrap());
        let (addr, server) = start_host(pool).await;

        for len in [0usize, 1, 4096, 1_000_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
            assert_eq!(exchange(addr, payload.clone()).await.unwrap(), payload);
        }

        server.abort();
    }

    #[tokio::test]
    async fn test_connection_closed_after_response() {
        let pool = WorkerPool::new(Arc::new(EchoCodec), NonZeroUsize::MIN);
        let (addr, server) = start_host(pool).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        ResizeRequestFrame::new(1.0, b"abc".to_vec())
            .unwrap()
            .write_to(&mut stream)
            .await
            .unwrap();
        let response = ResizeResponseFrame::read_from(&mut stream).await.unwrap();
        assert_eq!(response.payload, b"abc");

        // Nothing may follow the single response.
        let err = ResizeResponseFrame::read_from(&mut stream).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));

        server.abort();
    }

    #[tokio::test]
    async fn test_worker_panic_closes_only_that_connection() {
        let pool = WorkerPool::new(Arc::new(PanickyCodec), NonZeroUsize::MIN);
        let (addr, server) = start_host(pool).await;

        let err = exchange(addr, vec![0xFF, 1, 2]).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));

        assert_eq!(exchange(addr, vec![1, 2, 3]).await.unwrap(), vec![1, 2, 3]);

        server.abort();
    }

    #[tokio::test]
    async fn test_truncated_request_does_not_stop_the_host() {
        let pool = WorkerPool::new(Arc::new(EchoCodec), NonZeroUsize::MIN);
        let (addr, server) = start_host(pool).await;

        {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&[0, 0]).await.unwrap();
            stream.shutdown().await.unwrap();
        }

        assert_eq!(exchange(addr, vec![9]).await.unwrap(), vec![9]);

        server.abort();
    }
}
