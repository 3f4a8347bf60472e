use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use log::{debug, error, info, warn};
use syzygy_shared::config::TableNames;
use syzygy_shared::models::{DeliveryRecord, DocumentChange, Event, Notification};
use syzygy_shared::push::{ExpoPushGateway, MulticastResponse, PushGateway, PushPayload};
use syzygy_shared::store::dynamo::{create_dynamo_client, DynamoNotificationStore, DynamoUserStore};
use syzygy_shared::store::{NotificationStore, UserStore};

use crate::errors::NotificationError;

pub const LOTTERY_WON_TITLE: &str = "Won event lottery";
pub const LOTTERY_LOST_TITLE: &str = "Lost event lottery";

/// Input to [`NotificationDispatcher::create_notification`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub title: String,
    pub description: String,
    pub recipients: Vec<String>,
    pub event_id: Option<String>,
    /// Set for organizer-originated notifications.
    pub organizer_id: Option<String>,
}

/// What a notification document write led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Sent,
    Withdrawn,
    Ignored,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
    push: Arc<dyn PushGateway>,
}

fn unique_ids<'a>(ids: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

impl NotificationDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
        push: Arc<dyn PushGateway>,
    ) -> Self {
        Self {
            notifications,
            users,
            push,
        }
    }

    /// DynamoDB stores and the Expo gateway, with table names from the
    /// environment.
    pub async fn from_env() -> Self {
        let client = create_dynamo_client().await;
        let tables = TableNames::from_env();

        Self::new(
            Arc::new(DynamoNotificationStore::with_client_and_tables(
                client.clone(),
                &tables,
            )),
            Arc::new(DynamoUserStore::with_client_and_table(client, tables.users)),
            Arc::new(ExpoPushGateway::new()),
        )
    }

    /// Records a notification with one delivery record per recipient, then
    /// delivers it. Returns `None` without writing anything when there are no
    /// recipients.
    pub async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<Option<Notification>, NotificationError> {
        let recipients = unique_ids(&new.recipients);
        if recipients.is_empty() {
            debug!("No recipients for notification '{}', skipping", new.title);
            return Ok(None);
        }

        let notification = Notification::new(
            &new.title,
            &new.description,
            new.event_id,
            new.organizer_id,
        );
        let records: Vec<DeliveryRecord> = recipients
            .iter()
            .map(|user_id| DeliveryRecord::new(&notification.id, user_id))
            .collect();

        // Records first: a crash in between leaves records without a
        // notification, never a notification without records.
        self.notifications.create_delivery_records(&records).await?;
        self.notifications.create_notification(&notification).await?;

        info!(
            "Created notification {} ('{}') for {} recipients",
            notification.id,
            notification.title,
            records.len()
        );

        self.claim_and_send(&notification, Some(records)).await?;
        Ok(Some(notification))
    }

    /// Delivers only if this caller wins the `sent` claim. A failed delivery
    /// gives the claim back before the error is returned.
    async fn claim_and_send(
        &self,
        notification: &Notification,
        known_records: Option<Vec<DeliveryRecord>>,
    ) -> Result<Option<MulticastResponse>, NotificationError> {
        if !self.notifications.claim_send(&notification.id).await? {
            debug!("Notification {} already claimed for sending", notification.id);
            return Ok(None);
        }

        let result = match known_records {
            Some(records) => self.send_notification(notification, &records).await,
            None => match self.notifications.delivery_records(&notification.id).await {
                Ok(records) => self.send_notification(notification, &records).await,
                Err(e) => Err(e.into()),
            },
        };

        match result {
            Ok(response) => Ok(Some(response)),
            Err(e) => {
                warn!(
                    "Delivery of notification {} failed, releasing claim: {}",
                    notification.id, e
                );
                if let Err(release_err) = self.notifications.release_send(&notification.id).await
                {
                    error!(
                        "Failed to release send claim on notification {}: {}",
                        notification.id, release_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Pushes a notification to every recipient in `records` that has a
    /// token and has not opted out of the notification's category, and marks
    /// their records as sent.
    pub async fn send_notification(
        &self,
        notification: &Notification,
        records: &[DeliveryRecord],
    ) -> Result<MulticastResponse, NotificationError> {
        let recipient_ids = unique_ids(records.iter().map(|r| &r.user_id));
        if recipient_ids.is_empty() {
            return Ok(MulticastResponse::default());
        }

        let profiles = self
            .users
            .get_profiles(&recipient_ids)
            .await
            .map_err(NotificationError::TokenLookupFailed)?;

        let category = notification.category();
        let mut tokens = Vec::new();
        let mut included = HashSet::new();

        for profile in &profiles {
            match profile.deliverable_token(category) {
                Some(token) => {
                    tokens.push(token.to_string());
                    included.insert(profile.id.as_str());
                }
                None => debug!(
                    "Skipping user {} for notification {}: no token or {:?} notifications disabled",
                    profile.id, notification.id, category
                ),
            }
        }

        if tokens.is_empty() {
            info!(
                "No deliverable recipients for notification {}",
                notification.id
            );
            return Ok(MulticastResponse::default());
        }

        let payload = PushPayload::for_notification(notification);
        let push_result = self.push.send_multicast(&tokens, &payload).await;

        // Included recipients are marked sent whatever the push outcome.
        let marks = records
            .iter()
            .filter(|r| included.contains(r.user_id.as_str()))
            .map(|r| self.notifications.mark_record_sent(&r.id));
        try_join_all(marks).await?;

        let response = push_result?;
        log_multicast(&notification.id, &response);
        Ok(response)
    }

    /// Tells devices that already received a notification to withdraw it.
    pub async fn delete_notification(
        &self,
        notification_id: &str,
    ) -> Result<MulticastResponse, NotificationError> {
        let records = self.notifications.delivery_records(notification_id).await?;
        let sent_to = unique_ids(records.iter().filter(|r| r.was_sent()).map(|r| &r.user_id));

        if sent_to.is_empty() {
            info!("Notification {} was never delivered, nothing to withdraw", notification_id);
            return Ok(MulticastResponse::default());
        }

        let profiles = self
            .users
            .get_profiles(&sent_to)
            .await
            .map_err(NotificationError::TokenLookupFailed)?;
        let tokens: Vec<String> = profiles
            .iter()
            .filter_map(|p| p.push_token.clone())
            .collect();

        if tokens.is_empty() {
            return Ok(MulticastResponse::default());
        }

        let response = self
            .push
            .send_multicast(&tokens, &PushPayload::for_deletion(notification_id))
            .await?;
        log_multicast(notification_id, &response);
        Ok(response)
    }

    /// Flags a notification as deleted. The resulting document write drives
    /// the withdrawal through [`Self::handle_notification_write`]. Returns
    /// false if it was already revoked.
    pub async fn revoke_notification(&self, notification_id: &str) -> Result<bool, NotificationError> {
        let notification = self
            .notifications
            .get_notification(notification_id)
            .await?
            .ok_or_else(|| NotificationError::NotFound(notification_id.to_string()))?;

        if notification.deleted {
            debug!("Notification {} already revoked", notification_id);
            return Ok(false);
        }

        self.notifications.mark_deleted(notification_id).await?;
        info!("Notification {} revoked", notification_id);
        Ok(true)
    }

    /// Reacts to a write on the notifications collection.
    pub async fn handle_notification_write(
        &self,
        change: &DocumentChange<Notification>,
    ) -> Result<WriteOutcome, NotificationError> {
        let after = match &change.after {
            Some(after) => after,
            None => return Ok(WriteOutcome::Ignored),
        };

        if after.deleted {
            let was_deleted = change.before.as_ref().map(|b| b.deleted).unwrap_or(false);
            if was_deleted {
                return Ok(WriteOutcome::Ignored);
            }
            self.delete_notification(&after.id).await?;
            return Ok(WriteOutcome::Withdrawn);
        }

        if after.sent {
            return Ok(WriteOutcome::Ignored);
        }

        match self.claim_and_send(after, None).await? {
            Some(_) => Ok(WriteOutcome::Sent),
            None => Ok(WriteOutcome::Ignored),
        }
    }

    /// Sends the "won" and "lost" notifications for a drawn lottery.
    pub async fn notify_of_lottery(
        &self,
        event: &Event,
        winners: &[String],
        losers: &[String],
    ) -> Result<(), NotificationError> {
        let name = event.display_name();

        let won = NewNotification {
            title: LOTTERY_WON_TITLE.to_string(),
            description: format!("You were selected to attend {}!", name),
            recipients: winners.to_vec(),
            event_id: Some(event.id.clone()),
            organizer_id: None,
        };
        let lost = NewNotification {
            title: LOTTERY_LOST_TITLE.to_string(),
            description: format!(
                "A lottery was run for {}. You were not selected this time.",
                name
            ),
            recipients: losers.to_vec(),
            event_id: Some(event.id.clone()),
            organizer_id: None,
        };

        tokio::try_join!(self.create_notification(won), self.create_notification(lost))?;
        Ok(())
    }
}

fn log_multicast(notification_id: &str, response: &MulticastResponse) {
    if response.success_count == 0 && response.failure_count > 0 {
        error!(
            "Notification {} failed for all {} devices",
            notification_id, response.failure_count
        );
    } else if response.failure_count > 0 {
        warn!(
            "Notification {} failed for {} of {} devices",
            notification_id,
            response.failure_count,
            response.success_count + response.failure_count
        );
    } else {
        info!(
            "Notification {} delivered to {} devices",
            notification_id, response.success_count
        );
    }
}
