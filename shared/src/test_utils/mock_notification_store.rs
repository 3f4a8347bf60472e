use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{collections, DeliveryRecord, Notification};
use crate::store::NotificationStore;

#[derive(Default)]
pub struct MockNotificationStore {
    notifications: Mutex<HashMap<String, Notification>>,
    records: Mutex<Vec<DeliveryRecord>>,
}

impl MockNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_notification(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap()
            .insert(notification.id.clone(), notification);
    }

    pub fn insert_record(&self, record: DeliveryRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn notification(&self, id: &str) -> Option<Notification> {
        self.notifications.lock().unwrap().get(id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().values().cloned().collect()
    }

    pub fn notifications_titled(&self, title: &str) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.title == title)
            .collect()
    }

    pub fn records_for(&self, notification_id: &str) -> Vec<DeliveryRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.notification_id == notification_id)
            .cloned()
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationStore for MockNotificationStore {
    async fn create_delivery_records(&self, records: &[DeliveryRecord]) -> Result<(), StoreError> {
        let mut stored = self.records.lock().unwrap();
        if let Some(dup) = records.iter().find(|r| stored.iter().any(|s| s.id == r.id)) {
            return Err(StoreError::ConditionFailed {
                collection: collections::USER_NOTIFICATIONS,
                id: dup.id.clone(),
            });
        }
        stored.extend(records.iter().cloned());
        Ok(())
    }

    async fn create_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut notifications = self.notifications.lock().unwrap();
        if notifications.contains_key(&notification.id) {
            return Err(StoreError::ConditionFailed {
                collection: collections::NOTIFICATIONS,
                id: notification.id.clone(),
            });
        }
        notifications.insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        Ok(self.notification(id))
    }

    async fn delivery_records(
        &self,
        notification_id: &str,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        Ok(self.records_for(notification_id))
    }

    async fn mark_record_sent(&self, record_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| StoreError::NotFound {
                collection: collections::USER_NOTIFICATIONS,
                id: record_id.to_string(),
            })?;
        record.sent = Some(true);
        Ok(())
    }

    async fn claim_send(&self, id: &str) -> Result<bool, StoreError> {
        let mut notifications = self.notifications.lock().unwrap();
        match notifications.get_mut(id) {
            Some(n) if !n.sent => {
                n.sent = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_send(&self, id: &str) -> Result<(), StoreError> {
        let mut notifications = self.notifications.lock().unwrap();
        let notification = notifications.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: collections::NOTIFICATIONS,
            id: id.to_string(),
        })?;
        notification.sent = false;
        Ok(())
    }

    async fn mark_deleted(&self, id: &str) -> Result<(), StoreError> {
        let mut notifications = self.notifications.lock().unwrap();
        let notification = notifications.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: collections::NOTIFICATIONS,
            id: id.to_string(),
        })?;
        notification.deleted = true;
        Ok(())
    }
}
