use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event document from the `events` collection.
///
/// `waiting_list` and `organizer_id` are optional so that malformed documents
/// can be detected instead of failing deserialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub registration_end: Option<DateTime<Utc>>,
    /// `None` means unbounded.
    #[serde(default)]
    pub max_attendees: Option<u32>,
    #[serde(default)]
    pub organizer_id: Option<String>,
    #[serde(default)]
    pub waiting_list: Option<Vec<String>>,
    #[serde(default)]
    pub invites: Vec<String>,
    #[serde(default)]
    pub lottery_complete: bool,
    /// Handle of the outstanding deferred draw task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lottery_task_name: Option<String>,
}

/// Where an event sits in the lottery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotteryState {
    NoTask,
    TaskScheduled,
    Complete,
}

impl Event {
    pub fn lottery_state(&self) -> LotteryState {
        if self.lottery_complete {
            LotteryState::Complete
        } else if self.lottery_task_name.is_some() {
            LotteryState::TaskScheduled
        } else {
            LotteryState::NoTask
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("your event")
    }
}

/// Fields merged onto an event when its lottery is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct LotteryResult {
    /// All invitation ids for the event, including ones issued before the draw.
    pub invites: Vec<String>,
    /// Waiting list after the winners were removed.
    pub waiting_list: Vec<String>,
}
