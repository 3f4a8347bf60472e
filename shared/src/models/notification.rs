use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_document_id;

/// A notification document from the `notifications` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub organizer_id: Option<String>,
    pub title: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub deleted: bool,
}

/// Which user preference flag governs delivery of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Organizer,
    System,
}

impl Notification {
    pub fn new(
        title: &str,
        description: &str,
        event_id: Option<String>,
        organizer_id: Option<String>,
    ) -> Self {
        Self {
            id: new_document_id(),
            event_id,
            organizer_id,
            title: title.to_string(),
            description: description.to_string(),
            creation_date: Utc::now(),
            sent: false,
            deleted: false,
        }
    }

    pub fn category(&self) -> NotificationCategory {
        if self.organizer_id.is_some() {
            NotificationCategory::Organizer
        } else {
            NotificationCategory::System
        }
    }
}

/// Per-recipient delivery bookkeeping, stored in `userNotifications`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub id: String,
    pub user_id: String,
    pub notification_id: String,
    #[serde(default)]
    pub sent: Option<bool>,
}

impl DeliveryRecord {
    pub fn new(notification_id: &str, user_id: &str) -> Self {
        Self {
            id: new_document_id(),
            user_id: user_id.to_string(),
            notification_id: notification_id.to_string(),
            sent: Some(false),
        }
    }

    /// Records written before the flag existed count as sent.
    pub fn was_sent(&self) -> bool {
        self.sent.unwrap_or(true)
    }
}
