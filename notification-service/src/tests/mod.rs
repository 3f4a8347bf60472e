mod dispatcher_test;

use std::sync::Arc;

use axum::response::Response;
use http_body_util::BodyExt;
use syzygy_shared::test_utils::mock_notification_store::MockNotificationStore;
use syzygy_shared::test_utils::mock_push_gateway::MockPushGateway;
use syzygy_shared::test_utils::mock_user_store::MockUserStore;
use syzygy_shared::test_utils::test_logging::init_test_logging;

use crate::NotificationDispatcher;

pub struct TestContext {
    pub dispatcher: NotificationDispatcher,
    pub notifications: Arc<MockNotificationStore>,
    pub users: Arc<MockUserStore>,
    pub push: Arc<MockPushGateway>,
}

pub fn create_test_dispatcher() -> TestContext {
    init_test_logging();

    let notifications = Arc::new(MockNotificationStore::new());
    let users = Arc::new(MockUserStore::new());
    let push = Arc::new(MockPushGateway::new());
    let dispatcher =
        NotificationDispatcher::new(notifications.clone(), users.clone(), push.clone());

    TestContext {
        dispatcher,
        notifications,
        users,
        push,
    }
}

pub async fn response_to_json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
