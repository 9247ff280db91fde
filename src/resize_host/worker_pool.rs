// Bounded pool that runs CPU-bound resize jobs for the resize host.
// Built once at startup and shared by every connection handler.

use crate::image_codec::{CodecError, SharedImageCodec};
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Resize failed: {0}")]
    Codec(#[from] CodecError),

    #[error("Resize worker panicked: {0}")]
    Panicked(String),

    #[error("Worker pool is closed")]
    PoolClosed,
}

#[derive(Clone)]
pub struct WorkerPool {
    codec: SharedImageCodec,
    permits: Arc<Semaphore>,
    size: NonZeroUsize,
}

impl WorkerPool {
    pub fn new(codec: SharedImageCodec, size: NonZeroUsize) -> Self {
        debug!("Creating worker pool with {} worker(s)", size);
        Self {
            codec,
            permits: Arc::new(Semaphore::new(size.get())),
            size,
        }
    }

    /// Sizes the pool to the number of parallel execution units available.
    pub fn with_available_parallelism(codec: SharedImageCodec) -> Self {
        let size = std::thread::available_parallelism().unwrap_or_else(|err| {
            warn!(
                "Could not query available parallelism ({}), using a single worker",
                err
            );
            NonZeroUsize::MIN
        });
        Self::new(codec, size)
    }

    pub fn size(&self) -> NonZeroUsize {
        self.size
    }

    /// Resizes `payload` on a pool worker, waiting for a free slot first.
    ///
    /// At most `size()` resizes run at once. A panic inside the codec is
    /// contained here and reported as [`WorkerError::Panicked`].
    pub async fn resize(&self, payload: Vec<u8>, scale_factor: f32) -> Result<Vec<u8>, WorkerError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::PoolClosed)?;

        let codec = self.codec.clone();
        let job = tokio::task::spawn_blocking(move || {
            // Held until the job ends, even if the awaiting handler goes away.
            let _permit = permit;
            codec.resize(&payload, scale_factor)
        });

        match job.await {
            Ok(result) => Ok(result?),
            Err(err) if err.is_panic() => Err(WorkerError::Panicked(panic_message(err.into_panic()))),
            Err(err) => Err(WorkerError::Panicked(err.to_string())),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
