use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
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

use crate::dispatcher::{NewNotification, NotificationDispatcher};
use crate::errors::{AppError, Result};

/// Body of `POST /notifications`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub recipient_ids: Vec<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub organizer_id: Option<String>,
}

/// Creates a router wired to DynamoDB and the Expo gateway.
pub async fn create_router() -> Router {
    info!("Creating router with DynamoDB stores");

    let dispatcher = Arc::new(NotificationDispatcher::from_env().await);

    let prefix = route_prefix();
    info!("Using API route prefix: {}", prefix);

    create_router_with_dispatcher(dispatcher, prefix)
}

pub fn create_router_with_dispatcher(dispatcher: Arc<NotificationDispatcher>, prefix: &str) -> Router {
    info!("Setting up notification routes with prefix: '{}'", prefix);

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

    let notification_routes = Router::new()
        .route("/notifications", post(create_notification))
        .route("/notifications/:id/revoke", post(revoke_notification))
        .with_state(dispatcher);

    let router = if prefix.is_empty() {
        notification_routes
    } else {
        Router::new().nest(prefix, notification_routes)
    };

    router
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .fallback(|req: Request| async move {
            warn!("No route matched for: {} {}", req.method(), req.uri());
            (
                StatusCode::NOT_FOUND,
                "The requested resource was not found".to_string(),
            )
        })
}

// POST /notifications
async fn create_notification(
    State(dispatcher): State<Arc<NotificationDispatcher>>,
    payload: std::result::Result<Json<CreateNotificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(request) = payload.map_err(|r| AppError::bad_request(r.body_text()))?;

    if request.title.trim().is_empty() {
        return Err(AppError::bad_request("title must not be empty".into()));
    }

    let created = dispatcher
        .create_notification(NewNotification {
            title: request.title,
            description: request.description,
            recipients: request.recipient_ids,
            event_id: request.event_id,
            organizer_id: request.organizer_id,
        })
        .await?;

    match created {
        Some(notification) => {
            let body = serde_json::to_value(&notification)
                .map_err(|e| AppError::internal_server_error(e.to_string()))?;
            Ok((StatusCode::CREATED, Json(body)))
        }
        None => Ok((
            StatusCode::OK,
            Json(json!({ "status": "skipped", "reason": "no recipients" })),
        )),
    }
}

// POST /notifications/:id/revoke
async fn revoke_notification(
    State(dispatcher): State<Arc<NotificationDispatcher>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let status = if dispatcher.revoke_notification(&id).await? {
        "revoked"
    } else {
        "alreadyRevoked"
    };
    Ok(Json(json!({ "id": id, "status": status })))
}
