//! Document store contracts, one trait per collection.

pub mod dynamo;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{DeliveryRecord, Event, Invitation, LotteryResult, Notification, UserProfile};

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError>;

    /// Records (`Some`) or clears (`None`) the outstanding draw task handle.
    async fn set_lottery_task(&self, id: &str, task_name: Option<&str>) -> Result<(), StoreError>;

    /// Merges the draw result, sets `lotteryComplete` and clears the task
    /// handle in one write. Fails with [`StoreError::ConditionFailed`] when the
    /// lottery is already complete.
    async fn complete_lottery(&self, id: &str, result: &LotteryResult) -> Result<(), StoreError>;

    /// Events that are not complete and have no outstanding task.
    async fn events_awaiting_lottery(&self) -> Result<Vec<Event>, StoreError>;
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn create_invitation(&self, invitation: &Invitation) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Creates all records atomically.
    async fn create_delivery_records(&self, records: &[DeliveryRecord]) -> Result<(), StoreError>;

    /// Fails with [`StoreError::ConditionFailed`] if the id is taken.
    async fn create_notification(&self, notification: &Notification) -> Result<(), StoreError>;

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, StoreError>;

    async fn delivery_records(&self, notification_id: &str)
        -> Result<Vec<DeliveryRecord>, StoreError>;

    async fn mark_record_sent(&self, record_id: &str) -> Result<(), StoreError>;

    /// Flips `sent` from false to true. Returns false if it was already true.
    async fn claim_send(&self, id: &str) -> Result<bool, StoreError>;

    /// Sets `sent` back to false after a failed delivery so that a retry can
    /// claim the notification again.
    async fn release_send(&self, id: &str) -> Result<(), StoreError>;

    async fn mark_deleted(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Batched read of the push-related profile fields. Unknown ids are
    /// omitted from the result.
    async fn get_profiles(&self, ids: &[String]) -> Result<Vec<UserProfile>, StoreError>;
}
