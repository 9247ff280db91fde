use thiserror::Error;

/// Failure to read or write a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection before sending a single byte of the frame.
    #[error("Connection closed before a frame was received")]
    ConnectionClosed,

    /// The peer closed the connection part way through a frame.
    #[error("Frame truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    #[error("Payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u32 },

    #[error("Invalid scale factor: {0}")]
    InvalidScaleFactor(f32),
}
