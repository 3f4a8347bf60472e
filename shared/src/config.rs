//! Runtime configuration read from the Lambda environment.

use std::env;

use chrono::Duration;
use log::error;

use crate::error::ConfigError;
use crate::models::collections;

/// Deferred tasks are never scheduled further out than this. Cloud Tasks
/// rejects anything beyond 30 days; 10 leaves a wide margin.
pub const TASK_HORIZON_DAYS: i64 = 10;

/// Reads a required variable, logging before failing.
pub fn required_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            let err = ConfigError::Missing { name };
            error!("{}", err);
            Err(err)
        }
    }
}

pub fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Route prefix for API Gateway stages. `REMOVE_BASE_PATH=true` drops it.
pub fn route_prefix() -> &'static str {
    let remove_base_path = env::var("REMOVE_BASE_PATH")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    if remove_base_path {
        ""
    } else {
        "/Prod"
    }
}

/// DynamoDB table names for each collection.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNames {
    pub events: String,
    pub invitations: String,
    pub notifications: String,
    pub user_notifications: String,
    /// GSI on `userNotifications` keyed by `notificationId`.
    pub user_notifications_index: String,
    pub users: String,
}

impl TableNames {
    pub fn from_env() -> Self {
        Self {
            events: env_or("EVENTS_TABLE", collections::EVENTS),
            invitations: env_or("INVITATIONS_TABLE", collections::INVITATIONS),
            notifications: env_or("NOTIFICATIONS_TABLE", collections::NOTIFICATIONS),
            user_notifications: env_or(
                "USER_NOTIFICATIONS_TABLE",
                collections::USER_NOTIFICATIONS,
            ),
            user_notifications_index: env_or(
                "USER_NOTIFICATIONS_INDEX",
                "notificationId-index",
            ),
            users: env_or("USERS_TABLE", collections::USERS),
        }
    }
}

/// Location of the Cloud Tasks queue that holds deferred lottery draws.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudTasksConfig {
    pub project_id: String,
    pub location: String,
    pub queue: String,
}

impl CloudTasksConfig {
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            queue: queue.into(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            project_id: required_env("CLOUD_TASKS_PROJECT_ID")?,
            location: env_or("CLOUD_TASKS_LOCATION", "us-central1"),
            queue: env_or("CLOUD_TASKS_QUEUE", "event-lottery"),
        })
    }

    pub fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue
        )
    }
}

/// Settings for the lottery scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct LotteryConfig {
    /// URL the deferred task calls back when registration closes.
    pub callback_url: String,
    /// Maximum lead time for a deferred task.
    pub horizon: Duration,
}

impl LotteryConfig {
    pub fn new(callback_url: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            horizon: Duration::days(TASK_HORIZON_DAYS),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = required_env("LOTTERY_CALLBACK_BASE_URL")?;
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            let err = ConfigError::Invalid {
                name: "LOTTERY_CALLBACK_BASE_URL",
                reason: format!("expected an http(s) URL, got {}", base_url),
            };
            error!("{}", err);
            return Err(err);
        }

        Ok(Self::new(format!(
            "{}/lottery/callback",
            base_url.trim_end_matches('/')
        )))
    }
}
