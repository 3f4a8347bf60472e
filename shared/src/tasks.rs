//! Deferred task scheduling: "call this URL at time T with payload P".
//!
//! [`CloudTasksScheduler`] creates HTTP tasks through the Cloud Tasks REST API.
//! The returned task name is the handle persisted on the owning document and
//! later used for cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::config::CloudTasksConfig;
use crate::error::TaskError;

const CLOUD_TASKS_API: &str = "https://cloudtasks.googleapis.com/v2";
const CLOUD_TASKS_SCOPE: &str = "https://www.googleapis.com/auth/cloud-tasks";

/// A callback to run once at `schedule_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub target_url: String,
    pub payload: serde_json::Value,
    pub schedule_time: DateTime<Utc>,
}

#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Creates the task and returns its handle.
    async fn create_task(&self, request: TaskRequest) -> Result<String, TaskError>;

    /// Deletes a task by handle. Returns [`TaskError::NotFound`] when the
    /// task already ran or was deleted.
    async fn delete_task(&self, task_name: &str) -> Result<(), TaskError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    task: CloudTask,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CloudTask {
    http_request: HttpRequest,
    schedule_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequest {
    url: String,
    http_method: String,
    headers: HashMap<String, String>,
    /// Base64 encoded.
    body: String,
}

#[derive(Debug, Deserialize)]
struct CloudTasksSuccessResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CloudTasksErrorResponse {
    error: CloudTasksError,
}

#[derive(Debug, Deserialize)]
struct CloudTasksError {
    message: String,
    #[serde(default)]
    status: String,
}

/// [`TaskScheduler`] backed by Google Cloud Tasks.
pub struct CloudTasksScheduler {
    config: CloudTasksConfig,
    token_provider: Arc<dyn gcp_auth::TokenProvider>,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudTasksScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudTasksScheduler")
            .field("config", &self.config)
            .field("token_provider", &"<TokenProvider>")
            .finish()
    }
}

impl CloudTasksScheduler {
    /// Discovers GCP credentials from the environment.
    pub async fn new(config: CloudTasksConfig) -> Result<Self, TaskError> {
        let token_provider = gcp_auth::provider()
            .await
            .map_err(|e| TaskError::Auth(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TaskError::Request(format!("Failed to create HTTP client: {}", e)))?;

        info!("Cloud Tasks scheduler using queue {}", config.queue_path());

        Ok(Self {
            config,
            token_provider,
            client,
        })
    }

    async fn access_token(&self) -> Result<String, TaskError> {
        let token = self
            .token_provider
            .token(&[CLOUD_TASKS_SCOPE])
            .await
            .map_err(|e| TaskError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }

    async fn api_error(response: reqwest::Response) -> TaskError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        let message = match serde_json::from_str::<CloudTasksErrorResponse>(&body) {
            Ok(parsed) => format!("{} ({})", parsed.error.message, parsed.error.status),
            Err(_) => body,
        };
        TaskError::Api { status, message }
    }
}

fn build_create_request(request: &TaskRequest) -> Result<CreateTaskRequest, TaskError> {
    let body = serde_json::to_vec(&request.payload)
        .map_err(|e| TaskError::Request(format!("Failed to encode task payload: {}", e)))?;

    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    Ok(CreateTaskRequest {
        task: CloudTask {
            http_request: HttpRequest {
                url: request.target_url.clone(),
                http_method: "POST".to_string(),
                headers,
                body: base64::engine::general_purpose::STANDARD.encode(body),
            },
            schedule_time: request
                .schedule_time
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        },
    })
}

#[async_trait]
impl TaskScheduler for CloudTasksScheduler {
    async fn create_task(&self, request: TaskRequest) -> Result<String, TaskError> {
        let body = build_create_request(&request)?;
        let access_token = self.access_token().await?;
        let api_url = format!("{}/{}/tasks", CLOUD_TASKS_API, self.config.queue_path());

        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Cloud Tasks create request failed: {}", e);
                TaskError::Request(e.to_string())
            })?;

        if !response.status().is_success() {
            let err = Self::api_error(response).await;
            error!("Cloud Tasks rejected task creation: {}", err);
            return Err(err);
        }

        let created: CloudTasksSuccessResponse = response
            .json()
            .await
            .map_err(|e| TaskError::Request(format!("Failed to parse task response: {}", e)))?;

        debug!(
            "Created task {} for {}",
            created.name, request.schedule_time
        );
        Ok(created.name)
    }

    async fn delete_task(&self, task_name: &str) -> Result<(), TaskError> {
        let access_token = self.access_token().await?;
        let api_url = format!("{}/{}", CLOUD_TASKS_API, task_name);

        let response = self
            .client
            .delete(&api_url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| TaskError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TaskError::NotFound(task_name.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        debug!("Deleted task {}", task_name);
        Ok(())
    }
}
