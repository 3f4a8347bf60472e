use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

use super::{create_test_context, response_to_json, test_event, waiting, TestContext};
use crate::routes::create_router_with_scheduler;
use crate::ScheduleOutcome;

fn create_test_app() -> (Router, TestContext) {
    let ctx = create_test_context();
    let app = create_router_with_scheduler(ctx.scheduler.clone(), "");
    (app, ctx)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_callback_draws_lottery() {
    let (app, ctx) = create_test_app();
    ctx.events
        .insert(test_event("event-1", Utc::now(), Some(2), waiting(5)));

    let response = app
        .oneshot(post_json("/lottery/callback", json!({ "eventId": "event-1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_to_json(response).await;
    assert_eq!(body["status"], "drawn");
    assert_eq!(body["winners"].as_array().unwrap().len(), 2);
    assert_eq!(body["waitingList"].as_array().unwrap().len(), 3);
    assert_eq!(body["invitationIds"].as_array().unwrap().len(), 2);
    assert!(ctx.events.event("event-1").unwrap().lottery_complete);
}

#[tokio::test]
async fn test_callback_acknowledges_broken_event() {
    let (app, ctx) = create_test_app();
    let mut event = test_event("event-1", Utc::now(), Some(2), waiting(5));
    event.organizer_id = None;
    ctx.events.insert(event);

    let response = app
        .clone()
        .oneshot(post_json("/lottery/callback", json!({ "eventId": "event-1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_to_json(response).await["status"], "skipped");

    let response = app
        .oneshot(post_json("/lottery/callback", json!({ "eventId": "gone" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_to_json(response).await["status"], "skipped");
}

#[tokio::test]
async fn test_callback_replay_reports_already_complete() {
    let (app, ctx) = create_test_app();
    ctx.events
        .insert(test_event("event-1", Utc::now(), Some(2), waiting(5)));

    for expected in ["drawn", "alreadyComplete"] {
        let response = app
            .clone()
            .oneshot(post_json("/lottery/callback", json!({ "eventId": "event-1" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_to_json(response).await["status"], expected);
    }

    assert_eq!(ctx.invitations.invitations().len(), 2);
}

#[tokio::test]
async fn test_draw_early() {
    let (app, ctx) = create_test_app();
    let event = test_event("event-1", Utc::now() + Duration::days(3), Some(4), waiting(6));
    ctx.events.insert(event.clone());
    let outcome = ctx.scheduler.schedule_lottery(&event).await.unwrap();
    assert!(matches!(outcome, ScheduleOutcome::Scheduled { .. }));

    let response = app
        .clone()
        .oneshot(post_json("/lottery/draw-early", json!({ "eventId": "event-1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_to_json(response).await;
    assert_eq!(body["winners"].as_array().unwrap().len(), 4);
    assert!(ctx.tasks.outstanding().is_empty());

    let response = app
        .oneshot(post_json("/lottery/draw-early", json!({ "eventId": "event-1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_draw_early_errors() {
    let (app, ctx) = create_test_app();
    let mut event = test_event("broken", Utc::now() + Duration::days(3), Some(4), waiting(6));
    event.waiting_list = None;
    ctx.events.insert(event);

    let response = app
        .clone()
        .oneshot(post_json("/lottery/draw-early", json!({ "eventId": "broken" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_to_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("waitingList"));

    let response = app
        .clone()
        .oneshot(post_json("/lottery/draw-early", json!({ "eventId": "missing" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(post_json("/lottery/draw-early", json!({ "eventId": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json("/lottery/draw-early", json!({ "lotteryId": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_prefixed_routes_and_fallback() {
    let ctx = create_test_context();
    let app = create_router_with_scheduler(ctx.scheduler.clone(), "/Prod");
    ctx.events
        .insert(test_event("event-1", Utc::now(), Some(1), waiting(2)));

    let response = app
        .clone()
        .oneshot(post_json("/Prod/lottery/callback", json!({ "eventId": "event-1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json("/lottery/callback", json!({ "eventId": "event-1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
