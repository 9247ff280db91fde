// Error types for the API server

use super::extract_request_data::ValidationError;
use crate::image_codec::CodecError;
use crate::main_process::dispatch_client::DispatchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

/// API server error types. Rendered as plain text bodies.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    ServiceUnavailable(String),
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::InternalServerError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error: {}", msg),
            ),
        };

        (status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        if let ValidationError::BadType { content_type } = &error {
            debug!("Unsupported upload content type: '{}'", content_type);
        }
        Self::BadRequest(error.to_string())
    }
}

impl From<CodecError> for ApiError {
    fn from(error: CodecError) -> Self {
        Self::InternalServerError(error.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        Self::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(error: ApiError) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_validation_errors_are_bad_requests() {
        let (status, body) = render(ValidationError::BadField.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad Request: Expected an image file upload.");

        let (status, body) = render(
            ValidationError::BadType {
                content_type: "text/plain".to_string(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid file type. Only JPG and PNG are allowed.");
    }

    #[tokio::test]
    async fn test_internal_errors_carry_the_message() {
        let (status, body) = render(ApiError::InternalServerError("boom".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal Server Error: boom");
    }
}
