use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use notification_service::NotificationError;
use serde_json::json;
use syzygy_shared::error::{ConfigError, StoreError, TaskError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LotteryError {
    /// The event document cannot support a draw. Never retried.
    #[error("Event {event_id} has no {field}")]
    DataIntegrity {
        event_id: String,
        field: &'static str,
    },

    #[error("Event {0} not found")]
    EventNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Failed to notify lottery participants: {0}")]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LotteryError {
    pub fn missing_field(event_id: &str, field: &'static str) -> Self {
        LotteryError::DataIntegrity {
            event_id: event_id.to_string(),
            field,
        }
    }

    /// Errors caused by the event data itself, which a retry cannot fix.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            LotteryError::DataIntegrity { .. } | LotteryError::EventNotFound(_)
        )
    }
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

    pub fn conflict(message: String) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: String) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal_server_error(message: String) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<LotteryError> for AppError {
    fn from(err: LotteryError) -> Self {
        match err {
            LotteryError::EventNotFound(_) => AppError::not_found(err.to_string()),
            LotteryError::DataIntegrity { .. } => AppError::unprocessable(err.to_string()),
            other => {
                error!("Lottery request failed: {}", other);
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
