use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app_state::AppState;

/// Guards the worker triggers with `Authorization: Bearer <FUNCTION_SECRET>`.
/// A no-op when no secret is configured.
pub async fn function_secret_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let Some(secret) = state.config.function_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if token == secret => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "invalid function secret");
            Err(unauthorized())
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "missing bearer token");
            Err(unauthorized())
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
