use thiserror::Error;

/// Errors raised by the document store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection} document {id} not found")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    #[error("Conditional write on {collection} document {id} was rejected")]
    ConditionFailed {
        collection: &'static str,
        id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("DynamoDB error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, StoreError::ConditionFailed { .. })
    }
}

impl From<serde_dynamo::Error> for StoreError {
    fn from(e: serde_dynamo::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors raised by the push delivery gateway.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Failed to send push notifications: {0}")]
    Request(String),

    #[error("Push API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse push response: {0}")]
    Response(String),
}

/// Errors raised by the deferred task scheduler.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task {0} not found")]
    NotFound(String),

    #[error("Task scheduler request failed: {0}")]
    Request(String),

    #[error("Task scheduler API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to authenticate with the task scheduler: {0}")]
    Auth(String),
}

/// Missing or malformed runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} environment variable not set")]
    Missing { name: &'static str },

    #[error("{name} environment variable is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}
