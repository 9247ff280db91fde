use super::{DEFAULT_SCALE_FACTOR, MAX_IMAGE_SIZE_BYTES, handlers};
use crate::image_codec::SharedImageCodec;
use crate::main_process::dispatch_client::DispatchClient;
use axum::{Router, extract::DefaultBodyLimit, routing::post};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

/// Per-process handler state. Cloned into every request; nothing in it is
/// mutated by a request.
#[derive(Clone)]
pub struct AppState {
    pub codec: SharedImageCodec,
    pub dispatcher: DispatchClient,
    pub scale_factor: f32,
    /// Upload slots when a concurrency ceiling is configured.
    pub upload_slots: Option<Arc<Semaphore>>,
}

impl AppState {
    pub fn new(codec: SharedImageCodec, dispatcher: DispatchClient) -> Self {
        Self {
            codec,
            dispatcher,
            scale_factor: DEFAULT_SCALE_FACTOR,
            upload_slots: None,
        }
    }

    /// Caps the number of uploads processed at once. Uploads over the cap are
    /// turned away rather than queued.
    pub fn with_upload_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.upload_slots = limit.map(|limit| Arc::new(Semaphore::new(limit.get())));
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload_image))
        // Apply a layer to limit the maximum size of request bodies
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE_BYTES))
        // Add CORS layer for broader client compatibility
        .layer(CorsLayer::permissive())
        // Add tracing for HTTP requests and responses
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        .with_state(state)
}
