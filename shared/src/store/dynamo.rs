//! DynamoDB implementations of the store contracts.
//!
//! Every table is keyed by a string `id`. Writes that must not create stray
//! items carry an `attribute_exists(#id)` condition.

use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use log::{debug, warn};

use super::{EventStore, InvitationStore, NotificationStore, UserStore};
use crate::config::TableNames;
use crate::error::StoreError;
use crate::models::{
    collections, DeliveryRecord, Event, Invitation, LotteryResult, Notification, UserProfile,
};

type Item = HashMap<String, AttributeValue>;

/// Maximum items in one TransactWriteItems call.
const TRANSACT_WRITE_LIMIT: usize = 100;
/// Maximum keys in one BatchGetItem call.
const BATCH_GET_LIMIT: usize = 100;
const MAX_UNPROCESSED_RETRIES: usize = 5;

fn backend_error<E: StdError>(e: E) -> StoreError {
    StoreError::Backend(DisplayErrorContext(e).to_string())
}

fn id_key(id: &str) -> AttributeValue {
    AttributeValue::S(id.to_string())
}

fn string_list(values: &[String]) -> AttributeValue {
    AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
}

pub async fn create_dynamo_client() -> Client {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    Client::new(&config)
}

async fn put_new_item<T: serde::Serialize>(
    client: &Client,
    table_name: &str,
    collection: &'static str,
    id: &str,
    value: &T,
) -> Result<(), StoreError> {
    let item: Item = serde_dynamo::to_item(value)?;

    let result = client
        .put_item()
        .table_name(table_name)
        .set_item(Some(item))
        .condition_expression("attribute_not_exists(#id)")
        .expression_attribute_names("#id", "id")
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e)
            if e
                .as_service_error()
                .map(|se| se.is_conditional_check_failed_exception())
                .unwrap_or(false) =>
        {
            Err(StoreError::ConditionFailed {
                collection,
                id: id.to_string(),
            })
        }
        Err(e) => Err(backend_error(e)),
    }
}

async fn get_item<T: serde::de::DeserializeOwned>(
    client: &Client,
    table_name: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    let output = client
        .get_item()
        .table_name(table_name)
        .key("id", id_key(id))
        .consistent_read(true)
        .send()
        .await
        .map_err(backend_error)?;

    match output.item {
        Some(item) => Ok(Some(serde_dynamo::from_item(item)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub struct DynamoEventStore {
    client: Client,
    table_name: String,
}

impl DynamoEventStore {
    pub fn with_client_and_table(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl EventStore for DynamoEventStore {
    async fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError> {
        get_item(&self.client, &self.table_name, id).await
    }

    async fn set_lottery_task(&self, id: &str, task_name: Option<&str>) -> Result<(), StoreError> {
        let request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", id_key(id))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", "id");

        let request = match task_name {
            Some(name) => request
                .update_expression("SET lotteryTaskName = :task")
                .expression_attribute_values(":task", AttributeValue::S(name.to_string())),
            None => request.update_expression("REMOVE lotteryTaskName"),
        };

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Err(StoreError::NotFound {
                    collection: collections::EVENTS,
                    id: id.to_string(),
                })
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn complete_lottery(&self, id: &str, result: &LotteryResult) -> Result<(), StoreError> {
        let outcome = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", id_key(id))
            .update_expression(
                "SET lotteryComplete = :complete, invites = :invites, waitingList = :waiting \
                 REMOVE lotteryTaskName",
            )
            .condition_expression(
                "attribute_exists(#id) AND \
                 (attribute_not_exists(lotteryComplete) OR lotteryComplete = :incomplete)",
            )
            .expression_attribute_names("#id", "id")
            .expression_attribute_values(":complete", AttributeValue::Bool(true))
            .expression_attribute_values(":incomplete", AttributeValue::Bool(false))
            .expression_attribute_values(":invites", string_list(&result.invites))
            .expression_attribute_values(":waiting", string_list(&result.waiting_list))
            .send()
            .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Err(StoreError::ConditionFailed {
                    collection: collections::EVENTS,
                    id: id.to_string(),
                })
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn events_awaiting_lottery(&self) -> Result<Vec<Event>, StoreError> {
        let mut events = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(
                    "(attribute_not_exists(lotteryComplete) OR lotteryComplete = :incomplete) \
                     AND (attribute_not_exists(lotteryTaskName) OR attribute_type(lotteryTaskName, :null))",
                )
                .expression_attribute_values(":incomplete", AttributeValue::Bool(false))
                .expression_attribute_values(":null", AttributeValue::S("NULL".to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend_error)?;

            for item in output.items.unwrap_or_default() {
                events.push(serde_dynamo::from_item(item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!("Found {} events awaiting a lottery", events.len());
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

pub struct DynamoInvitationStore {
    client: Client,
    table_name: String,
}

impl DynamoInvitationStore {
    pub fn with_client_and_table(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl InvitationStore for DynamoInvitationStore {
    async fn create_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        put_new_item(
            &self.client,
            &self.table_name,
            collections::INVITATIONS,
            &invitation.id,
            invitation,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Notifications and delivery records
// ---------------------------------------------------------------------------

pub struct DynamoNotificationStore {
    client: Client,
    notifications_table: String,
    records_table: String,
    records_index: String,
}

impl DynamoNotificationStore {
    pub fn with_client_and_tables(client: Client, tables: &TableNames) -> Self {
        Self {
            client,
            notifications_table: tables.notifications.clone(),
            records_table: tables.user_notifications.clone(),
            records_index: tables.user_notifications_index.clone(),
        }
    }

    /// Sets a boolean flag on an existing item. Returns `Ok(false)` when the
    /// condition rejected the write.
    async fn set_flag(
        &self,
        table_name: &str,
        id: &str,
        flag: &str,
        value: bool,
        condition: &str,
    ) -> Result<bool, StoreError> {
        let mut request = self
            .client
            .update_item()
            .table_name(table_name)
            .key("id", id_key(id))
            .update_expression("SET #flag = :value")
            .condition_expression(condition)
            .expression_attribute_names("#id", "id")
            .expression_attribute_names("#flag", flag)
            .expression_attribute_values(":value", AttributeValue::Bool(value));

        if condition.contains(":off") {
            request = request.expression_attribute_values(":off", AttributeValue::Bool(false));
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Ok(false)
            }
            Err(e) => Err(backend_error(e)),
        }
    }
}

#[async_trait]
impl NotificationStore for DynamoNotificationStore {
    async fn create_delivery_records(&self, records: &[DeliveryRecord]) -> Result<(), StoreError> {
        if records.len() > TRANSACT_WRITE_LIMIT {
            // Each chunk is atomic on its own.
            warn!(
                "Writing {} delivery records in {} transactions",
                records.len(),
                records.len().div_ceil(TRANSACT_WRITE_LIMIT)
            );
        }

        for chunk in records.chunks(TRANSACT_WRITE_LIMIT) {
            let items = chunk
                .iter()
                .map(|record| -> Result<TransactWriteItem, StoreError> {
                    let item: Item = serde_dynamo::to_item(record)?;
                    let put = Put::builder()
                        .table_name(&self.records_table)
                        .set_item(Some(item))
                        .condition_expression("attribute_not_exists(#id)")
                        .expression_attribute_names("#id", "id")
                        .build()
                        .map_err(backend_error)?;
                    Ok(TransactWriteItem::builder().put(put).build())
                })
                .collect::<Result<Vec<_>, _>>()?;

            self.client
                .transact_write_items()
                .set_transact_items(Some(items))
                .send()
                .await
                .map_err(backend_error)?;
        }

        Ok(())
    }

    async fn create_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        put_new_item(
            &self.client,
            &self.notifications_table,
            collections::NOTIFICATIONS,
            &notification.id,
            notification,
        )
        .await
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        get_item(&self.client, &self.notifications_table, id).await
    }

    async fn delivery_records(
        &self,
        notification_id: &str,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.records_table)
                .index_name(&self.records_index)
                .key_condition_expression("notificationId = :notification")
                .expression_attribute_values(
                    ":notification",
                    AttributeValue::S(notification_id.to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend_error)?;

            for item in output.items.unwrap_or_default() {
                records.push(serde_dynamo::from_item(item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn mark_record_sent(&self, record_id: &str) -> Result<(), StoreError> {
        let updated = self
            .set_flag(&self.records_table, record_id, "sent", true, "attribute_exists(#id)")
            .await?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                collection: collections::USER_NOTIFICATIONS,
                id: record_id.to_string(),
            })
        }
    }

    async fn claim_send(&self, id: &str) -> Result<bool, StoreError> {
        self.set_flag(
            &self.notifications_table,
            id,
            "sent",
            true,
            "attribute_exists(#id) AND (attribute_not_exists(#flag) OR #flag = :off)",
        )
        .await
    }

    async fn release_send(&self, id: &str) -> Result<(), StoreError> {
        let updated = self
            .set_flag(&self.notifications_table, id, "sent", false, "attribute_exists(#id)")
            .await?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                collection: collections::NOTIFICATIONS,
                id: id.to_string(),
            })
        }
    }

    async fn mark_deleted(&self, id: &str) -> Result<(), StoreError> {
        let updated = self
            .set_flag(&self.notifications_table, id, "deleted", true, "attribute_exists(#id)")
            .await?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                collection: collections::NOTIFICATIONS,
                id: id.to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub struct DynamoUserStore {
    client: Client,
    table_name: String,
}

impl DynamoUserStore {
    pub fn with_client_and_table(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl UserStore for DynamoUserStore {
    async fn get_profiles(&self, ids: &[String]) -> Result<Vec<UserProfile>, StoreError> {
        // BatchGetItem rejects duplicate keys.
        let mut seen = HashSet::new();
        let unique: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

        let mut profiles = Vec::with_capacity(unique.len());

        for chunk in unique.chunks(BATCH_GET_LIMIT) {
            let keys: Vec<Item> = chunk
                .iter()
                .map(|id| HashMap::from([("id".to_string(), id_key(id))]))
                .collect();

            let keys_and_attributes = KeysAndAttributes::builder()
                .set_keys(Some(keys))
                .projection_expression("#id, fcmToken, organizerNotifications, systemNotifications")
                .expression_attribute_names("#id", "id")
                .build()
                .map_err(backend_error)?;

            let mut pending = Some(HashMap::from([(
                self.table_name.clone(),
                keys_and_attributes,
            )]));
            let mut attempts = 0;

            while let Some(request_items) = pending.take() {
                if attempts >= MAX_UNPROCESSED_RETRIES {
                    return Err(StoreError::Backend(format!(
                        "BatchGetItem left keys unprocessed after {} attempts",
                        attempts
                    )));
                }
                attempts += 1;

                let output = self
                    .client
                    .batch_get_item()
                    .set_request_items(Some(request_items))
                    .send()
                    .await
                    .map_err(backend_error)?;

                if let Some(mut responses) = output.responses {
                    for item in responses.remove(&self.table_name).unwrap_or_default() {
                        profiles.push(serde_dynamo::from_item(item)?);
                    }
                }

                pending = output.unprocessed_keys.filter(|keys| !keys.is_empty());
            }
        }

        Ok(profiles)
    }
}
