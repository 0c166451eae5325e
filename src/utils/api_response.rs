use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::assignment::{AssignmentError, TransitionError};
use crate::db::store::StoreError;

/// Envelope returned by every domain endpoint.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiResponse<()>>;

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: Some(data),
            errors: None,
        }
    }

    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<serde_json::Value>,
    ) -> Self {
        ApiResponse {
            success: false,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: None,
            errors,
        }
    }
}

impl ApiResponse<()> {
    /// Generic 500. The cause goes to the log, never to the client.
    pub fn internal(context: &str, error: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %error, "{context}");
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
    }
}

impl From<StoreError> for ApiResponse<()> {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => {
                ApiResponse::error(StatusCode::NOT_FOUND, format!("{what} not found"), None)
            }
            other => ApiResponse::internal("store operation failed", &other),
        }
    }
}

impl From<AssignmentError> for ApiResponse<()> {
    fn from(e: AssignmentError) -> Self {
        match e {
            AssignmentError::Transition(t) => {
                let status = if t.is_validation() {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    StatusCode::CONFLICT
                };
                ApiResponse::error(status, t.to_string(), Some(json!({ "code": transition_code(&t) })))
            }
            AssignmentError::AssignmentNotFound(_) | AssignmentError::TaskNotFound(_) => {
                ApiResponse::error(StatusCode::NOT_FOUND, e.to_string(), None)
            }
            AssignmentError::EmptyTitle | AssignmentError::NoAssignees => {
                ApiResponse::error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), None)
            }
            AssignmentError::Store(store) => store.into(),
        }
    }
}

fn transition_code(e: &TransitionError) -> &'static str {
    match e {
        TransitionError::InvalidStatusTransition { .. } => "invalid_status_transition",
        TransitionError::NotSubmitted { .. } => "not_submitted",
        TransitionError::ReviewNoteRequired => "review_note_required",
        TransitionError::InvalidReviewTarget(_) => "invalid_review_target",
        TransitionError::ReviewUnchanged(_) => "review_unchanged",
        TransitionError::AttachmentRequired => "attachment_required",
    }
}
