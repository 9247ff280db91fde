// HTTP front end of the grayscale server.
// Accepts image uploads, grayscales them locally and has the resize host shrink them.

mod app;
mod error;
mod extract_request_data;
mod handlers;

pub use app::{AppState, create_app};

// Maximum allowed size for image upload requests
pub const MAX_IMAGE_SIZE_BYTES: usize = 100 * 1024 * 1024; // 100MB

/// Multipart field that must carry the upload.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Factor every upload is resized by.
pub const DEFAULT_SCALE_FACTOR: f32 = 0.5;
