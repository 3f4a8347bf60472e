use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{collections, Event, LotteryResult};
use crate::store::EventStore;

#[derive(Default)]
pub struct MockEventStore {
    events: Mutex<HashMap<String, Event>>,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        let store = Self::new();
        for event in events {
            store.insert(event);
        }
        store
    }

    pub fn insert(&self, event: Event) {
        self.events.lock().unwrap().insert(event.id.clone(), event);
    }

    pub fn remove(&self, id: &str) -> Option<Event> {
        self.events.lock().unwrap().remove(id)
    }

    /// Snapshot of a stored event.
    pub fn event(&self, id: &str) -> Option<Event> {
        self.events.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError> {
        Ok(self.event(id))
    }

    async fn set_lottery_task(&self, id: &str, task_name: Option<&str>) -> Result<(), StoreError> {
        let mut events = self.events.lock().unwrap();
        let event = events.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: collections::EVENTS,
            id: id.to_string(),
        })?;
        event.lottery_task_name = task_name.map(String::from);
        Ok(())
    }

    async fn complete_lottery(&self, id: &str, result: &LotteryResult) -> Result<(), StoreError> {
        let mut events = self.events.lock().unwrap();
        match events.get_mut(id) {
            Some(event) if !event.lottery_complete => {
                event.lottery_complete = true;
                event.invites = result.invites.clone();
                event.waiting_list = Some(result.waiting_list.clone());
                event.lottery_task_name = None;
                Ok(())
            }
            _ => Err(StoreError::ConditionFailed {
                collection: collections::EVENTS,
                id: id.to_string(),
            }),
        }
    }

    async fn events_awaiting_lottery(&self) -> Result<Vec<Event>, StoreError> {
        let mut events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| !e.lottery_complete && e.lottery_task_name.is_none())
            .cloned()
            .collect();
        events.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(events)
    }
}
