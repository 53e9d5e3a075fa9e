use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, ApiError>;

/// Every failure a handler can surface. Rendered as `{success: false, error}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad or missing client input.
    #[error("{0}")]
    Validation(String),
    /// The image was readable but yielded no usable face.
    #[error("{0}")]
    Detection(String),
    #[error("Request body exceeds the {0} byte limit")]
    PayloadTooLarge(usize),
    /// Anything else; the cause text is passed through to the caller.
    #[error("Error processing image: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Detection(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    fn from_rejection(status: StatusCode, text: String, limit: usize) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(limit)
        } else if status.is_server_error() {
            Self::Internal(text)
        } else {
            Self::Validation(text)
        }
    }

    pub fn from_json_rejection(rejection: JsonRejection, limit: usize) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text(), limit)
    }

    pub fn from_multipart_rejection(rejection: MultipartRejection, limit: usize) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text(), limit)
    }

    pub fn from_multipart_error(error: MultipartError, limit: usize) -> Self {
        Self::from_rejection(error.status(), error.body_text(), limit)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(%status, error = %self, "request rejected");
        }
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}
