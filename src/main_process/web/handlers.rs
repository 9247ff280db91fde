// API handlers for the web server

use super::{
    app::AppState,
    error::ApiError,
    extract_request_data::extract_upload,
};
use axum::{
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

// --- POST /upload ---
// Converts the uploaded JPEG/PNG to grayscale and returns it resized as PNG
pub async fn upload_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    // Held until the response is built.
    let _upload_slot = match &state.upload_slots {
        Some(slots) => Some(slots.clone().try_acquire_owned().map_err(|_| {
            ApiError::ServiceUnavailable(
                "Service Unavailable: too many uploads in progress.".to_string(),
            )
        })?),
        None => None,
    };

    let request_id = Uuid::new_v4();

    let upload = extract_upload(request).await.inspect_err(|err| {
        warn!("Rejected upload: request_id={}, reason={:?}", request_id, err);
    })?;
    info!(
        "Upload request: field={}, filename={}, content_type={}, size={}, request_id={}",
        upload.field_name,
        upload.filename,
        upload.content_type,
        upload.data.len(),
        request_id
    );

    // Pixel work stays off the event loop thread.
    let codec = state.codec.clone();
    let data = upload.data;
    let grayscale = tokio::task::spawn_blocking(move || codec.to_grayscale_png(&data))
        .await
        .map_err(|e| ApiError::InternalServerError(format!("Grayscale task failed: {}", e)))?
        .inspect_err(|err| warn!("Grayscale failed: request_id={}, {}", request_id, err))?;

    debug!(
        "Grayscale done: {} bytes, request_id={}",
        grayscale.len(),
        request_id
    );

    let resized = state
        .dispatcher
        .dispatch(grayscale, state.scale_factor)
        .await
        .inspect_err(|err| warn!("Dispatch failed: request_id={}, {}", request_id, err))?;

    info!(
        "Upload processed: {} bytes returned, request_id={}",
        resized.len(),
        request_id
    );

    Ok(([(header::CONTENT_TYPE, mime::IMAGE_PNG.as_ref())], resized).into_response())
}
