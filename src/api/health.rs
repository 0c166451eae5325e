use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::db::store::AssignmentRepository;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

/// **Liveness Check**
/// - ✅ Verifies that the API is running
/// - ❌ Does NOT check the database
async fn liveness_check() -> Json<Value> {
    Json(json!({ "success": true, "message": "API is live" }))
}

/// **Readiness Check**
/// - ✅ Ensures the store answers
/// - ❌ Returns `503` if it does not
async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.store.ping().await.map_err(|e| {
        tracing::warn!(error = %e, "readiness check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "Database unavailable" })),
        )
    })?;

    Ok(Json(json!({ "success": true, "message": "API is ready" })))
}
