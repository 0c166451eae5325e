//! Worker triggers, invoked by an external scheduler.
//!
//! These return bare JSON rather than the `ApiResponse` envelope and never
//! leak internal error details.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::app_state::AppState;
use crate::db::models::notification::{EnqueueRequest, NewNotification, NotificationEvent};
use crate::db::store::NotificationQueue;

pub fn function_routes() -> Router<AppState> {
    Router::new()
        .route("/functions/v1/send-reminders", post(send_reminders))
        .route("/functions/v1/dispatch-notifications", post(dispatch_notifications))
        .route("/functions/v1/enqueue-notification", post(enqueue_notification))
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[utoipa::path(
    post,
    path = "/functions/v1/send-reminders",
    tag = "Functions",
    responses(
        (status = 200, description = "Reminder rows queued, e.g. {status, dueQueued, overdueQueued}"),
        (status = 401, description = "Missing or wrong function secret")
    ),
    security(("bearerAuth" = []))
)]
pub async fn send_reminders(State(state): State<AppState>) -> Response {
    let summary = state.reminders.run(Utc::now()).await;

    Json(json!({
        "status": "ok",
        "dueQueued": summary.due_queued,
        "overdueQueued": summary.overdue_queued,
    }))
    .into_response()
}

#[utoipa::path(
    post,
    path = "/functions/v1/dispatch-notifications",
    tag = "Functions",
    responses(
        (status = 200, description = "Batch dispatched, e.g. {status, fetched, processed, skipped}"),
        (status = 401, description = "Missing or wrong function secret"),
        (status = 500, description = "Queue unavailable")
    ),
    security(("bearerAuth" = []))
)]
pub async fn dispatch_notifications(State(state): State<AppState>) -> Response {
    match state.dispatcher.run(Utc::now()).await {
        Ok(summary) => Json(json!({
            "status": "ok",
            "fetched": summary.fetched,
            "processed": summary.processed,
            "skipped": summary.skipped,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "dispatch run failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

#[utoipa::path(
    post,
    path = "/functions/v1/enqueue-notification",
    tag = "Functions",
    request_body = EnqueueRequest,
    responses(
        (status = 200, description = "Row queued, e.g. {status: \"queued\", id}"),
        (status = 400, description = "Body is not valid JSON"),
        (status = 401, description = "Missing or wrong function secret"),
        (status = 422, description = "event_type missing"),
        (status = 500, description = "Queue unavailable")
    ),
    security(("bearerAuth" = []))
)]
pub async fn enqueue_notification(State(state): State<AppState>, body: Bytes) -> Response {
    let request: EnqueueRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed enqueue body");
            return failure(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    let Some(event_type) = request
        .event_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return failure(StatusCode::UNPROCESSABLE_ENTITY, "event_type is required");
    };

    let notification = NewNotification {
        organization_id: request.organization_id,
        task_id: request.task_id,
        assignment_id: request.assignment_id,
        event: NotificationEvent::from_parts(
            event_type,
            request.payload.unwrap_or_else(|| json!({})),
        ),
    };

    match state.store.insert_notification(&notification).await {
        Ok(id) => {
            tracing::info!(notification_id = id, event_type, "notification queued via trigger");
            Json(json!({ "status": "queued", "id": id })).into_response()
        }
        Err(e) => {
            tracing::error!(event_type, error = %e, "failed to queue notification");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
