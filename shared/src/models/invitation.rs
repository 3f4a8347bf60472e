use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_document_id;

/// An invitation issued to a lottery winner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub event_id: String,
    pub organizer_id: String,
    pub recipient_id: String,
    pub send_time: DateTime<Utc>,
    #[serde(default)]
    pub accepted: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub cancel_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_time: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn new(event_id: &str, organizer_id: &str, recipient_id: &str) -> Self {
        Self {
            id: new_document_id(),
            event_id: event_id.to_string(),
            organizer_id: organizer_id.to_string(),
            recipient_id: recipient_id.to_string(),
            send_time: Utc::now(),
            accepted: false,
            cancelled: false,
            cancel_time: None,
            response_time: None,
        }
    }
}
