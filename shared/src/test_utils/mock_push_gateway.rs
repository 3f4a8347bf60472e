use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PushError;
use crate::push::{MulticastResponse, PushGateway, PushPayload};

/// One recorded multicast call.
#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub tokens: Vec<String>,
    pub payload: PushPayload,
}

#[derive(Default)]
pub struct MockPushGateway {
    sent: Mutex<Vec<SentPush>>,
    failing_tokens: Mutex<HashSet<String>>,
    fail_next: AtomicBool,
    calls: AtomicUsize,
}

impl MockPushGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next multicast call fail outright. Failed calls are counted
    /// by [`Self::calls`] but not recorded in [`Self::sent`].
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of multicast calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tokens the gateway reports as failed deliveries.
    pub fn fail_token(&self, token: &str) {
        self.failing_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sends_with_title(&self, title: &str) -> Vec<SentPush> {
        self.sent()
            .into_iter()
            .filter(|s| s.payload.title == title)
            .collect()
    }

    /// Every token that received a payload for `notification_id`.
    pub fn tokens_for(&self, notification_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| s.payload.data.get("id").map(String::as_str) == Some(notification_id))
            .flat_map(|s| s.tokens)
            .collect()
    }
}

#[async_trait]
impl PushGateway for MockPushGateway {
    async fn send_multicast(
        &self,
        tokens: &[String],
        payload: &PushPayload,
    ) -> Result<MulticastResponse, PushError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PushError::Request("connection reset by peer".to_string()));
        }

        let failing = self.failing_tokens.lock().unwrap();
        let failure_count = tokens.iter().filter(|t| failing.contains(*t)).count();

        self.sent.lock().unwrap().push(SentPush {
            tokens: tokens.to_vec(),
            payload: payload.clone(),
        });

        Ok(MulticastResponse {
            success_count: tokens.len() - failure_count,
            failure_count,
        })
    }
}
