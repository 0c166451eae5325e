pub mod assignments;
pub mod device_tokens;
pub mod functions;
pub mod health;
pub mod tasks;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{routing::get, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::db::models::assignment::{Assignment, AssignmentStatus, ReviewDecision, ReviewStatus, StatusChange};
use crate::db::models::device_token::{DeviceToken, NewDeviceToken};
use crate::db::models::notification::EnqueueRequest;
use crate::db::models::task::{PublishTask, PublishedTask, RescheduleTask, Task};
use crate::middleware::auth::function_secret_middleware;
use crate::middleware::request_logger::log_requests;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        functions::send_reminders,
        functions::dispatch_notifications,
        functions::enqueue_notification,
        tasks::publish_task,
        tasks::reschedule_task,
        assignments::update_status,
        assignments::review_assignment,
        device_tokens::register_device_token,
        device_tokens::list_device_tokens,
    ),
    components(schemas(
        Assignment,
        AssignmentStatus,
        ReviewStatus,
        StatusChange,
        ReviewDecision,
        Task,
        PublishTask,
        PublishedTask,
        RescheduleTask,
        DeviceToken,
        NewDeviceToken,
        EnqueueRequest,
    )),
    tags(
        (name = "Functions", description = "Worker triggers"),
        (name = "Tasks", description = "Task publication and scheduling"),
        (name = "Assignments", description = "Assignment lifecycle and review"),
        (name = "Device Tokens", description = "Push token registry")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn router(state: AppState) -> Router {
    let functions = functions::function_routes()
        .route_layer(from_fn_with_state(state.clone(), function_secret_middleware));

    Router::new()
        .merge(health::health_routes())
        .merge(functions)
        .merge(tasks::task_routes())
        .merge(assignments::assignment_routes())
        .merge(device_tokens::device_token_routes())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(from_fn(log_requests))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
