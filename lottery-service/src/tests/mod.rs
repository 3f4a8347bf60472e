mod routes_test;

use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use notification_service::NotificationDispatcher;
use syzygy_shared::config::LotteryConfig;
use syzygy_shared::models::Event;
use syzygy_shared::test_utils::mock_event_store::MockEventStore;
use syzygy_shared::test_utils::mock_invitation_store::MockInvitationStore;
use syzygy_shared::test_utils::mock_notification_store::MockNotificationStore;
use syzygy_shared::test_utils::mock_push_gateway::MockPushGateway;
use syzygy_shared::test_utils::mock_task_scheduler::MockTaskScheduler;
use syzygy_shared::test_utils::mock_user_store::MockUserStore;
use syzygy_shared::test_utils::test_logging::init_test_logging;

use crate::LotteryScheduler;

pub const CALLBACK_URL: &str = "https://api.example.com/Prod/lottery/callback";

pub struct TestContext {
    pub scheduler: Arc<LotteryScheduler>,
    pub events: Arc<MockEventStore>,
    pub invitations: Arc<MockInvitationStore>,
    pub tasks: Arc<MockTaskScheduler>,
    pub notifications: Arc<MockNotificationStore>,
    pub users: Arc<MockUserStore>,
    pub push: Arc<MockPushGateway>,
}

pub fn create_test_context() -> TestContext {
    init_test_logging();

    let events = Arc::new(MockEventStore::new());
    let invitations = Arc::new(MockInvitationStore::new());
    let tasks = Arc::new(MockTaskScheduler::new());
    let notifications = Arc::new(MockNotificationStore::new());
    let users = Arc::new(MockUserStore::new());
    let push = Arc::new(MockPushGateway::new());

    let dispatcher =
        NotificationDispatcher::new(notifications.clone(), users.clone(), push.clone());
    let scheduler = Arc::new(LotteryScheduler::new(
        events.clone(),
        invitations.clone(),
        tasks.clone(),
        dispatcher,
        LotteryConfig::new(CALLBACK_URL),
    ));

    TestContext {
        scheduler,
        events,
        invitations,
        tasks,
        notifications,
        users,
        push,
    }
}

pub fn waiting(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("user-{}", i)).collect()
}

pub fn test_event(
    id: &str,
    registration_end: DateTime<Utc>,
    max_attendees: Option<u32>,
    waiting_list: Vec<String>,
) -> Event {
    Event {
        id: id.to_string(),
        name: Some("Board Game Night".to_string()),
        registration_end: Some(registration_end),
        max_attendees,
        organizer_id: Some("organizer-1".to_string()),
        waiting_list: Some(waiting_list),
        invites: vec![],
        lottery_complete: false,
        lottery_task_name: None,
    }
}

pub async fn response_to_json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
