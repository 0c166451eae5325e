use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::patch,
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::assignment::{Assignment, ReviewDecision, StatusChange};
use crate::utils::api_response::{ApiResponse, ApiResult};

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/assignments/{id}/status", patch(update_status))
        .route("/assignments/{id}/review", patch(review_assignment))
}

/// Assignee moves their assignment along the lifecycle.
#[utoipa::path(
    patch,
    path = "/assignments/{id}/status",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Status updated", body = Assignment),
        (status = 404, description = "Assignment not found"),
        (status = 409, description = "Transition not allowed from the current status"),
        (status = 422, description = "Attachment required")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChange>,
) -> ApiResult<Assignment> {
    let assignment = state
        .assignments
        .change_status(id, payload, Utc::now())
        .await?;

    Ok(ApiResponse::success(StatusCode::OK, "Status updated", assignment))
}

/// Reviewer accepts a submission or requests changes.
#[utoipa::path(
    patch,
    path = "/assignments/{id}/review",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = ReviewDecision,
    responses(
        (status = 200, description = "Review recorded", body = Assignment),
        (status = 404, description = "Assignment not found"),
        (status = 409, description = "Assignment not submitted or review unchanged"),
        (status = 422, description = "Note required when requesting changes")
    )
)]
pub async fn review_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewDecision>,
) -> ApiResult<Assignment> {
    let assignment = state.assignments.review(id, payload, Utc::now()).await?;

    Ok(ApiResponse::success(StatusCode::OK, "Review recorded", assignment))
}
