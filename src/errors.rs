use crate::services::{object_store::StorageError, user_service::UserError};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidIdentifier(_) => AppError::bad_request(err.to_string()),
            StorageError::NotFound(_) | StorageError::NoVideos => {
                AppError::not_found(err.to_string())
            }
            StorageError::DuplicateId(_)
            | StorageError::IncompleteUpload(_)
            | StorageError::UploadFailed { .. }
            | StorageError::StoreUnavailable(_)
            | StorageError::Corrupt { .. }
            | StorageError::Database(_)
            | StorageError::Io(_) => {
                tracing::error!(error = %err, "video storage failure");
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Validation(msg) => AppError::bad_request(msg),
            UserError::InvalidCredentials => {
                AppError::new(StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            UserError::Sqlx(err) => {
                tracing::error!(error = %err, "user storage failure");
                AppError::internal("user storage failure")
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}
