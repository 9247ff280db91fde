use super::UPLOAD_FIELD_NAME;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
};
use thiserror::Error;
use tracing::debug;

// Matched as substrings of the lower-cased declared type, so parameters such
// as "; charset=binary" do not matter.
const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Bad Request: Expected an image file upload.")]
    BadField,

    #[error("Invalid file type. Only JPG and PNG are allowed.")]
    BadType { content_type: String },

    #[error("Bad Request: Uploaded file is empty.")]
    EmptyFile,

    #[error("Bad Request: {0}")]
    Multipart(String),
}

/// A validated upload, fully read into memory.
#[derive(Debug)]
pub struct UploadRequest {
    pub field_name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Reads the first part of a `multipart/form-data` request and checks that it
/// is a JPEG or PNG file in the `file` field. Later parts are never looked at.
pub async fn extract_upload(request: Request) -> Result<UploadRequest, ValidationError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ValidationError::Multipart(e.body_text()))?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::Multipart(e.body_text()))?
        .ok_or(ValidationError::BadField)?;

    let field_name = match field.name() {
        Some(name) if name == UPLOAD_FIELD_NAME => name.to_string(),
        other => {
            debug!("First multipart field is {:?}, not '{}'", other, UPLOAD_FIELD_NAME);
            return Err(ValidationError::BadField);
        }
    };
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or(ValidationError::BadField)?;

    let content_type = field
        .content_type()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ACCEPTED_CONTENT_TYPES
        .iter()
        .any(|accepted| content_type.contains(accepted))
    {
        return Err(ValidationError::BadType { content_type });
    }

    let data = field
        .bytes()
        .await
        .map_err(|e| ValidationError::Multipart(e.body_text()))?;
    if data.is_empty() {
        return Err(ValidationError::EmptyFile);
    }

    debug!(
        "Received '{}' ({}, {} bytes)",
        filename,
        content_type,
        data.len()
    );

    Ok(UploadRequest {
        field_name,
        filename,
        content_type,
        data,
    })
}
