use axum::{
    extract::{rejection::JsonRejection, Request, State},
    middleware,
    routing::post,
    Json, Router,
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use syzygy_shared::config::route_prefix;
use tower_http::cors::{Any, CorsLayer};

use crate::errors::{AppError, LotteryError, Result};
use crate::scheduler::{DrawOutcome, DrawTrigger, LotteryScheduler};

/// Body of both the task callback and the early draw request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRequest {
    pub event_id: String,
}

/// Creates a router wired to the production scheduler.
pub async fn create_router() -> std::result::Result<Router, LotteryError> {
    info!("Creating router with DynamoDB stores and Cloud Tasks");

    let scheduler = Arc::new(LotteryScheduler::from_env().await?);

    let prefix = route_prefix();
    info!("Using API route prefix: {}", prefix);

    Ok(create_router_with_scheduler(scheduler, prefix))
}

/// Creates a router around a given scheduler.
pub fn create_router_with_scheduler(scheduler: Arc<LotteryScheduler>, prefix: &str) -> Router {
    info!("Setting up lottery routes with prefix: '{}'", prefix);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    async fn logging_middleware(
        req: Request,
        next: axum::middleware::Next,
    ) -> impl axum::response::IntoResponse {
        info!(
            "Router received request: method={}, uri={}",
            req.method(),
            req.uri()
        );
        next.run(req).await
    }

    let lottery_routes = Router::new()
        .route("/lottery/callback", post(lottery_callback))
        .route("/lottery/draw-early", post(draw_early))
        .with_state(scheduler);

    let router = if prefix.is_empty() {
        lottery_routes
    } else {
        Router::new().nest(prefix, lottery_routes)
    };

    router
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .fallback(|req: Request| async move {
            warn!("No route matched for: {} {}", req.method(), req.uri());
            (
                axum::http::StatusCode::NOT_FOUND,
                "The requested resource was not found".to_string(),
            )
        })
}

fn drawn_json(outcome: DrawOutcome) -> Value {
    match outcome {
        DrawOutcome::Drawn {
            winners,
            waiting_list,
            invitation_ids,
        } => json!({
            "status": "drawn",
            "winners": winners,
            "waitingList": waiting_list,
            "invitationIds": invitation_ids,
        }),
        DrawOutcome::AlreadyComplete => json!({ "status": "alreadyComplete" }),
    }
}

// POST /lottery/callback
//
// Called by the deferred task. Anything other than a 2xx makes the task
// retry, so problems with the event itself are acknowledged as skipped.
async fn lottery_callback(
    State(scheduler): State<Arc<LotteryScheduler>>,
    payload: std::result::Result<Json<DrawRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Discarding malformed lottery callback: {}", rejection);
            return Ok(Json(json!({ "status": "skipped", "reason": rejection.body_text() })));
        }
    };

    match scheduler
        .draw_lottery(&request.event_id, DrawTrigger::Scheduled)
        .await
    {
        Ok(outcome) => Ok(Json(drawn_json(outcome))),
        Err(e) if e.is_data_integrity() => {
            warn!("Skipping lottery for event {}: {}", request.event_id, e);
            Ok(Json(json!({ "status": "skipped", "reason": e.to_string() })))
        }
        Err(e) => Err(e.into()),
    }
}

// POST /lottery/draw-early
async fn draw_early(
    State(scheduler): State<Arc<LotteryScheduler>>,
    payload: std::result::Result<Json<DrawRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload.map_err(|r| AppError::bad_request(r.body_text()))?;

    if request.event_id.trim().is_empty() {
        return Err(AppError::bad_request("eventId must not be empty".into()));
    }

    match scheduler
        .draw_lottery(&request.event_id, DrawTrigger::Early)
        .await?
    {
        DrawOutcome::AlreadyComplete => Err(AppError::conflict(format!(
            "Lottery for event {} was already drawn",
            request.event_id
        ))),
        outcome => Ok(Json(drawn_json(outcome))),
    }
}
