// Client for sending resize requests to the resize host.
// Every call uses its own connection; nothing is pooled or retried.

use crate::protocol::{FrameError, ResizeRequestFrame, ResizeResponseFrame};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to connect to resize host at {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Resize host exchange failed: {0}")]
    Frame(#[from] FrameError),

    #[error("Resize host did not answer within {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone)]
pub struct DispatchClient {
    backend_addr: SocketAddr,
    timeout: Option<Duration>,
}

impl DispatchClient {
    pub fn new(backend_addr: SocketAddr) -> Self {
        Self {
            backend_addr,
            timeout: None,
        }
    }

    /// Bounds each whole exchange (connect, write, read). `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_addr(&self) -> SocketAddr {
        self.backend_addr
    }

    /// Sends `payload` to the resize host and returns the resized image.
    pub async fn dispatch(&self, payload: Vec<u8>, scale_factor: f32) -> Result<Vec<u8>, DispatchError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(payload, scale_factor))
                .await
                .map_err(|_| DispatchError::TimedOut(limit))?,
            None => self.exchange(payload, scale_factor).await,
        }
    }

    async fn exchange(&self, payload: Vec<u8>, scale_factor: f32) -> Result<Vec<u8>, DispatchError> {
        let request = ResizeRequestFrame::new(scale_factor, payload)?;

        let mut stream = TcpStream::connect(self.backend_addr)
            .await
            .map_err(|source| DispatchError::Connect {
                addr: self.backend_addr,
                source,
            })?;

        request.write_to(&mut stream).await?;
        let response = ResizeResponseFrame::read_from(&mut stream).await?;

        if let Err(err) = stream.shutdown().await {
            debug!("Error closing resize host connection: {}", err);
        }

        debug!(
            "Dispatched {} bytes, received {} bytes",
            request.payload.len(),
            response.payload.len()
        );
        Ok(response.payload)
    }
}
