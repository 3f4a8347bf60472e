use syzygy_shared::models::{DeliveryRecord, DocumentChange, Event, Notification, UserProfile};
use syzygy_shared::test_utils::mock_user_store::token_for;

use super::{create_test_dispatcher, TestContext};
use crate::dispatcher::{LOTTERY_LOST_TITLE, LOTTERY_WON_TITLE};
use crate::{NewNotification, NotificationError, WriteOutcome};

fn new_notification(recipients: &[&str], organizer_id: Option<&str>) -> NewNotification {
    NewNotification {
        title: "Schedule change".to_string(),
        description: "The event now starts at 7pm".to_string(),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        event_id: Some("event-1".to_string()),
        organizer_id: organizer_id.map(String::from),
    }
}

/// A stored notification that was never claimed, with one record per user.
fn seed_unsent(ctx: &TestContext, users: &[&str]) -> Notification {
    let notification = Notification::new("Reminder", "Tomorrow", None, None);
    for user in users {
        ctx.notifications
            .insert_record(DeliveryRecord::new(&notification.id, user));
    }
    ctx.notifications.insert_notification(notification.clone());
    notification
}

#[tokio::test]
async fn test_create_with_no_recipients_is_noop() {
    let ctx = create_test_dispatcher();

    let created = ctx
        .dispatcher
        .create_notification(new_notification(&[], None))
        .await
        .unwrap();

    assert!(created.is_none());
    assert!(ctx.notifications.notifications().is_empty());
    assert_eq!(ctx.notifications.record_count(), 0);
    assert!(ctx.push.sent().is_empty());
}

#[tokio::test]
async fn test_create_records_and_delivers() {
    let ctx = create_test_dispatcher();
    for user in ["alice", "bob", "carol"] {
        ctx.users.insert_with_token(user);
    }

    let notification = ctx
        .dispatcher
        .create_notification(new_notification(&["alice", "bob", "carol", "bob"], None))
        .await
        .unwrap()
        .unwrap();

    let stored = ctx.notifications.notification(&notification.id).unwrap();
    assert!(stored.sent);
    assert!(!stored.deleted);
    assert_eq!(stored.event_id.as_deref(), Some("event-1"));

    let records = ctx.notifications.records_for(&notification.id);
    assert_eq!(records.len(), 3, "duplicate recipients get one record");
    assert!(records.iter().all(|r| r.sent == Some(true)));

    let sent = ctx.push.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tokens.len(), 3);
    assert_eq!(sent[0].payload.title, "Schedule change");
    assert_eq!(sent[0].payload.data["id"], notification.id);
    assert_eq!(sent[0].payload.data["eventId"], "event-1");
    assert_eq!(sent[0].payload.data["deleted"], "false");
}

#[tokio::test]
async fn test_opted_out_recipient_is_never_pushed() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");
    ctx.users.insert(UserProfile {
        id: "bob".into(),
        push_token: Some(token_for("bob")),
        organizer_notifications: Some(false),
        system_notifications: Some(true),
    });
    ctx.users.insert(UserProfile {
        id: "carol".into(),
        push_token: None,
        ..Default::default()
    });

    let notification = ctx
        .dispatcher
        .create_notification(new_notification(&["alice", "bob", "carol"], Some("org-1")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ctx.push.tokens_for(&notification.id), vec![token_for("alice")]);

    let records = ctx.notifications.records_for(&notification.id);
    let sent_users: Vec<&str> = records
        .iter()
        .filter(|r| r.sent == Some(true))
        .map(|r| r.user_id.as_str())
        .collect();
    assert_eq!(sent_users, vec!["alice"]);
}

#[tokio::test]
async fn test_system_category_uses_system_flag() {
    let ctx = create_test_dispatcher();
    ctx.users.insert(UserProfile {
        id: "bob".into(),
        push_token: Some(token_for("bob")),
        organizer_notifications: Some(false),
        system_notifications: None,
    });

    let notification = ctx
        .dispatcher
        .create_notification(new_notification(&["bob"], None))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ctx.push.tokens_for(&notification.id), vec![token_for("bob")]);
}

#[tokio::test]
async fn test_partial_push_failure_is_not_fatal() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");
    ctx.users.insert_with_token("bob");
    ctx.push.fail_token(&token_for("bob"));

    let notification = ctx
        .dispatcher
        .create_notification(new_notification(&["alice", "bob"], None))
        .await
        .unwrap()
        .unwrap();

    // Both were attempted, so both count as sent.
    let records = ctx.notifications.records_for(&notification.id);
    assert!(records.iter().all(|r| r.sent == Some(true)));
}

#[tokio::test]
async fn test_refired_sent_notification_does_not_push() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");

    let notification = ctx
        .dispatcher
        .create_notification(new_notification(&["alice"], None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctx.push.sent().len(), 1);

    // Stream image of the insert still shows sent = false.
    let insert = DocumentChange::created(notification.clone());
    let outcome = ctx.dispatcher.handle_notification_write(&insert).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Ignored);

    let stored = ctx.notifications.notification(&notification.id).unwrap();
    let modify = DocumentChange::updated(notification, stored);
    let outcome = ctx.dispatcher.handle_notification_write(&modify).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Ignored);

    assert_eq!(ctx.push.sent().len(), 1);
}

#[tokio::test]
async fn test_trigger_sends_unclaimed_notification() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");
    ctx.users.insert_with_token("bob");
    let notification = seed_unsent(&ctx, &["alice", "bob"]);

    let change = DocumentChange::created(notification.clone());
    let outcome = ctx.dispatcher.handle_notification_write(&change).await.unwrap();

    assert_eq!(outcome, WriteOutcome::Sent);
    assert!(ctx.notifications.notification(&notification.id).unwrap().sent);
    assert_eq!(ctx.push.tokens_for(&notification.id).len(), 2);

    // A second delivery of the same stream record does nothing.
    let outcome = ctx.dispatcher.handle_notification_write(&change).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Ignored);
    assert_eq!(ctx.push.sent().len(), 1);
}

#[tokio::test]
async fn test_failed_push_is_retried_by_trigger() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");
    let notification = seed_unsent(&ctx, &["alice"]);
    ctx.push.fail_next();

    let change = DocumentChange::created(notification.clone());
    let result = ctx.dispatcher.handle_notification_write(&change).await;

    assert!(matches!(result, Err(NotificationError::SendFailed(_))));
    assert!(
        !ctx.notifications.notification(&notification.id).unwrap().sent,
        "claim is given back after a failed push"
    );

    // The stream redelivers the same record.
    let outcome = ctx.dispatcher.handle_notification_write(&change).await.unwrap();

    assert_eq!(outcome, WriteOutcome::Sent);
    assert_eq!(ctx.push.calls(), 2);
    assert_eq!(ctx.push.tokens_for(&notification.id), vec![token_for("alice")]);
    assert!(ctx.notifications.notification(&notification.id).unwrap().sent);
}

#[tokio::test]
async fn test_failed_inline_send_leaves_notification_unsent() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");
    ctx.push.fail_next();

    let result = ctx
        .dispatcher
        .create_notification(new_notification(&["alice"], None))
        .await;
    assert!(matches!(result, Err(NotificationError::SendFailed(_))));

    let stored = ctx.notifications.notifications();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].sent);

    // The insert reaching the trigger delivers it.
    let outcome = ctx
        .dispatcher
        .handle_notification_write(&DocumentChange::created(stored[0].clone()))
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Sent);
    assert_eq!(ctx.push.tokens_for(&stored[0].id), vec![token_for("alice")]);
}

#[tokio::test]
async fn test_send_error_marks_records_then_fails() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");
    ctx.users.insert_with_token("bob");
    let notification = seed_unsent(&ctx, &["alice", "bob"]);
    let records = ctx.notifications.records_for(&notification.id);
    ctx.push.fail_next();

    let result = ctx
        .dispatcher
        .send_notification(&notification, &records)
        .await;

    assert!(matches!(result, Err(NotificationError::SendFailed(_))));
    assert_eq!(ctx.push.calls(), 1);
    assert!(ctx.push.sent().is_empty());
    assert!(ctx
        .notifications
        .records_for(&notification.id)
        .iter()
        .all(|r| r.sent == Some(true)));
}

#[tokio::test]
async fn test_delete_targets_only_sent_records() {
    let ctx = create_test_dispatcher();
    for user in ["alice", "bob", "carol", "dave"] {
        ctx.users.insert_with_token(user);
    }

    let notification = Notification::new("Moved", "New venue", Some("event-1".into()), None);
    let mut sent = DeliveryRecord::new(&notification.id, "alice");
    sent.sent = Some(true);
    let unsent = DeliveryRecord::new(&notification.id, "bob");
    let mut legacy = DeliveryRecord::new(&notification.id, "carol");
    legacy.sent = None;
    ctx.notifications.insert_record(sent);
    ctx.notifications.insert_record(unsent);
    ctx.notifications.insert_record(legacy);
    ctx.notifications.insert_notification(notification.clone());

    let response = ctx
        .dispatcher
        .delete_notification(&notification.id)
        .await
        .unwrap();

    assert_eq!(response.success_count, 2);
    let pushes = ctx.push.sent();
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].payload.is_deletion());
    assert_eq!(pushes[0].payload.title, "Deleted");
    assert_eq!(pushes[0].payload.body, "Deleted notification");

    let mut tokens = pushes[0].tokens.clone();
    tokens.sort();
    assert_eq!(tokens, vec![token_for("alice"), token_for("carol")]);
}

#[tokio::test]
async fn test_revoke_then_trigger_withdraws_once() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("alice");

    let notification = ctx
        .dispatcher
        .create_notification(new_notification(&["alice"], None))
        .await
        .unwrap()
        .unwrap();
    let before = ctx.notifications.notification(&notification.id).unwrap();

    let revoked = ctx
        .dispatcher
        .revoke_notification(&notification.id)
        .await
        .unwrap();
    assert!(revoked);
    let after = ctx.notifications.notification(&notification.id).unwrap();
    assert!(after.deleted);
    assert!(after.sent, "revocation leaves sent untouched");

    let change = DocumentChange::updated(before, after.clone());
    let outcome = ctx.dispatcher.handle_notification_write(&change).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Withdrawn);

    let withdrawals: Vec<_> = ctx
        .push
        .sent()
        .into_iter()
        .filter(|s| s.payload.is_deletion())
        .collect();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].tokens, vec![token_for("alice")]);

    // Later writes on an already deleted notification are ignored.
    let change = DocumentChange::updated(after.clone(), after);
    let outcome = ctx.dispatcher.handle_notification_write(&change).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Ignored);

    // Revoking again writes nothing.
    let revoked = ctx
        .dispatcher
        .revoke_notification(&notification.id)
        .await
        .unwrap();
    assert!(!revoked);
}

#[tokio::test]
async fn test_revoke_unknown_notification_fails() {
    let ctx = create_test_dispatcher();
    let result = ctx.dispatcher.revoke_notification("missing").await;
    assert!(matches!(result, Err(NotificationError::NotFound(id)) if id == "missing"));
}

#[tokio::test]
async fn test_notify_of_lottery() {
    let ctx = create_test_dispatcher();
    for user in ["w1", "w2", "l1"] {
        ctx.users.insert_with_token(user);
    }
    let event: Event = serde_json::from_value(serde_json::json!({
        "id": "event-9",
        "name": "Spring Gala",
        "organizerId": "org-1",
        "waitingList": []
    }))
    .unwrap();

    ctx.dispatcher
        .notify_of_lottery(&event, &["w1".into(), "w2".into()], &["l1".into()])
        .await
        .unwrap();

    let won = ctx.notifications.notifications_titled(LOTTERY_WON_TITLE);
    assert_eq!(won.len(), 1);
    assert_eq!(won[0].description, "You were selected to attend Spring Gala!");
    assert_eq!(won[0].event_id.as_deref(), Some("event-9"));
    assert!(won[0].organizer_id.is_none());
    assert_eq!(ctx.push.tokens_for(&won[0].id).len(), 2);

    let lost = ctx.notifications.notifications_titled(LOTTERY_LOST_TITLE);
    assert_eq!(lost.len(), 1);
    assert_eq!(
        lost[0].description,
        "A lottery was run for Spring Gala. You were not selected this time."
    );
    assert_eq!(ctx.push.tokens_for(&lost[0].id), vec![token_for("l1")]);
}

#[tokio::test]
async fn test_notify_of_lottery_without_losers() {
    let ctx = create_test_dispatcher();
    ctx.users.insert_with_token("w1");
    let event: Event = serde_json::from_value(serde_json::json!({ "id": "event-3" })).unwrap();

    ctx.dispatcher
        .notify_of_lottery(&event, &["w1".into()], &[])
        .await
        .unwrap();

    assert_eq!(ctx.notifications.notifications().len(), 1);
    assert!(ctx.notifications.notifications_titled(LOTTERY_LOST_TITLE).is_empty());
}
