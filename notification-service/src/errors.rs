use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use syzygy_shared::error::{PushError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification {0} not found")]
    NotFound(String),

    #[error("Notification store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to look up push tokens: {0}")]
    TokenLookupFailed(StoreError),

    #[error("Failed to send push notification: {0}")]
    SendFailed(#[from] PushError),
}

/// Error returned from HTTP handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn new(status: StatusCode, message: String) -> Self {
        Self { status, message }
    }

    pub fn bad_request(message: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: String) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: String) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(_) => AppError::not_found(err.to_string()),
            other => {
                error!("Notification request failed: {}", other);
                AppError::internal_server_error(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
