use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::{TaskRequest, TaskScheduler};

#[derive(Default)]
pub struct MockTaskScheduler {
    outstanding: Mutex<HashMap<String, TaskRequest>>,
    deleted: Mutex<Vec<String>>,
    failing_events: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    counter: AtomicUsize,
}

impl MockTaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create_task` call fail.
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Makes `create_task` fail for payloads carrying this event id.
    pub fn fail_for_event(&self, event_id: &str) {
        self.failing_events
            .lock()
            .unwrap()
            .insert(event_id.to_string());
    }

    pub fn outstanding(&self) -> HashMap<String, TaskRequest> {
        self.outstanding.lock().unwrap().clone()
    }

    pub fn task(&self, name: &str) -> Option<TaskRequest> {
        self.outstanding.lock().unwrap().get(name).cloned()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn created_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskScheduler for MockTaskScheduler {
    async fn create_task(&self, request: TaskRequest) -> Result<String, TaskError> {
        let event_id = request.payload["eventId"].as_str().unwrap_or_default();
        if self.fail_all.load(Ordering::SeqCst)
            || self.failing_events.lock().unwrap().contains(event_id)
        {
            return Err(TaskError::Api {
                status: 503,
                message: "scheduler unavailable".into(),
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("projects/test/locations/local/queues/lottery/tasks/{}", n);
        self.outstanding
            .lock()
            .unwrap()
            .insert(name.clone(), request);
        Ok(name)
    }

    async fn delete_task(&self, task_name: &str) -> Result<(), TaskError> {
        match self.outstanding.lock().unwrap().remove(task_name) {
            Some(_) => {
                self.deleted.lock().unwrap().push(task_name.to_string());
                Ok(())
            }
            None => Err(TaskError::NotFound(task_name.to_string())),
        }
    }
}
