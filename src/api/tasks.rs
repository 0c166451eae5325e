use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::task::{PublishTask, PublishedTask, RescheduleTask};
use crate::utils::api_response::{ApiResponse, ApiResult};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(publish_task))
        .route("/tasks/{task_id}/due-date", patch(reschedule_task))
}

/// ✅ **Publish a task to the selected group members**
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = PublishTask,
    responses(
        (status = 201, description = "Task and assignments created", body = PublishedTask),
        (status = 422, description = "Empty title or no assignees"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn publish_task(
    State(state): State<AppState>,
    Json(payload): Json<PublishTask>,
) -> ApiResult<PublishedTask> {
    let published = state.assignments.publish_task(payload, Utc::now()).await?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Task published successfully",
        published,
    ))
}

#[utoipa::path(
    patch,
    path = "/tasks/{task_id}/due-date",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    request_body = RescheduleTask,
    responses(
        (status = 200, description = "Due date changed, reminder markers cleared"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn reschedule_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<RescheduleTask>,
) -> ApiResult<Value> {
    let reset = state
        .assignments
        .reschedule_task(task_id, payload.due_at)
        .await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Due date updated",
        json!({ "task_id": task_id, "due_at": payload.due_at, "assignments_reset": reset }),
    ))
}
