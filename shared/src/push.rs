use std::collections::HashMap;

use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::PushError;
use crate::models::Notification;

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Expo accepts at most this many messages per request.
const EXPO_MAX_BATCH: usize = 100;

/// What a device receives: a visible title/body and a string data map the
/// client uses to correlate and withdraw notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

impl PushPayload {
    pub fn for_notification(notification: &Notification) -> Self {
        let mut data = HashMap::new();
        data.insert("id".to_string(), notification.id.clone());
        data.insert(
            "eventId".to_string(),
            notification.event_id.clone().unwrap_or_default(),
        );
        data.insert("deleted".to_string(), "false".to_string());

        Self {
            title: notification.title.clone(),
            body: notification.description.clone(),
            data,
        }
    }

    /// Tells devices to withdraw a notification they already showed.
    pub fn for_deletion(notification_id: &str) -> Self {
        let mut data = HashMap::new();
        data.insert("id".to_string(), notification_id.to_string());
        data.insert("deleted".to_string(), "true".to_string());

        Self {
            title: "Deleted".to_string(),
            body: "Deleted notification".to_string(),
            data,
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.data.get("deleted").map(String::as_str) == Some("true")
    }
}

/// Aggregate result of a multicast send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MulticastResponse {
    pub success_count: usize,
    pub failure_count: usize,
}

/// Sends one payload to many device tokens.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send_multicast(
        &self,
        tokens: &[String],
        payload: &PushPayload,
    ) -> Result<MulticastResponse, PushError>;
}

#[derive(Debug, Serialize)]
pub struct ExpoPushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpoPushResponse {
    pub data: Vec<ExpoPushTicket>,
}

#[derive(Debug, Deserialize)]
pub struct ExpoPushTicket {
    pub status: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// [`PushGateway`] backed by the Expo push API.
#[derive(Debug, Clone)]
pub struct ExpoPushGateway {
    client: Client,
    endpoint: String,
}

impl Default for ExpoPushGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpoPushGateway {
    pub fn new() -> Self {
        Self::with_endpoint(EXPO_PUSH_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn send_batch(
        &self,
        messages: &[ExpoPushMessage],
    ) -> Result<Vec<ExpoPushTicket>, PushError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("Accept-Encoding", "gzip, deflate")
            .header("Content-Type", "application/json")
            .json(messages)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send push notifications: {}", e);
                PushError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Expo push API returned error status {}: {}",
                status, error_text
            );
            return Err(PushError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let push_response: ExpoPushResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Expo push response: {}", e);
            PushError::Response(e.to_string())
        })?;

        Ok(push_response.data)
    }
}

#[async_trait]
impl PushGateway for ExpoPushGateway {
    async fn send_multicast(
        &self,
        tokens: &[String],
        payload: &PushPayload,
    ) -> Result<MulticastResponse, PushError> {
        if tokens.is_empty() {
            info!("No push tokens provided, skipping push notification");
            return Ok(MulticastResponse::default());
        }

        let data = serde_json::to_value(&payload.data)
            .map_err(|e| PushError::Request(format!("Failed to encode push data: {}", e)))?;

        let messages: Vec<ExpoPushMessage> = tokens
            .iter()
            .map(|token| ExpoPushMessage {
                to: token.clone(),
                title: payload.title.clone(),
                body: payload.body.clone(),
                data: Some(data.clone()),
                sound: if payload.is_deletion() {
                    None
                } else {
                    Some("default".to_string())
                },
            })
            .collect();

        info!("Sending {} push notifications to Expo", messages.len());

        let mut response = MulticastResponse::default();
        for batch in messages.chunks(EXPO_MAX_BATCH) {
            let tickets = self.send_batch(batch).await?;

            for (i, ticket) in tickets.iter().enumerate() {
                if ticket.status == "ok" {
                    response.success_count += 1;
                } else {
                    error!(
                        "Push notification {} failed: status={}, message={:?}",
                        i, ticket.status, ticket.message
                    );
                    response.failure_count += 1;
                }
            }
            // Tokens Expo did not return a ticket for were not delivered.
            response.failure_count += batch.len().saturating_sub(tickets.len());
        }

        info!(
            "Push multicast finished: {} succeeded, {} failed",
            response.success_count, response.failure_count
        );

        Ok(response)
    }
}
