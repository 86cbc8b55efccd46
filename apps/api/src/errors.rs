use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::evaluation::models::ErrorKind;

/// Gateway-level error type for requests that never reach the pipeline.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::InvalidUpload,
            AppError::PayloadTooLarge(_) => ErrorKind::UploadTooLarge,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match self {
            AppError::Validation(msg) | AppError::PayloadTooLarge(msg) => msg,
        };

        let body = Json(json!({
            "error": {
                "code": kind.code(),
                "message": message
            }
        }));

        (kind.status_code(), body).into_response()
    }
}
