use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::device_token::{DeviceToken, NewDeviceToken};
use crate::db::store::DeviceTokenRegistry;
use crate::utils::api_response::{ApiResponse, ApiResult};

pub fn device_token_routes() -> Router<AppState> {
    Router::new()
        .route("/device-tokens", post(register_device_token))
        .route("/users/{user_id}/device-tokens", get(list_device_tokens))
}

/// ✅ **Register (or refresh) a push token for a user's device**
#[utoipa::path(
    post,
    path = "/device-tokens",
    tag = "Device Tokens",
    request_body = NewDeviceToken,
    responses(
        (status = 200, description = "Token registered", body = DeviceToken),
        (status = 422, description = "Empty token")
    )
)]
pub async fn register_device_token(
    State(state): State<AppState>,
    Json(mut payload): Json<NewDeviceToken>,
) -> ApiResult<DeviceToken> {
    payload.token = payload.token.trim().to_string();
    if payload.token.is_empty() {
        return Err(ApiResponse::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "token must not be empty",
            None,
        ));
    }

    let token = state
        .store
        .register_device_token(&payload, Utc::now())
        .await?;

    Ok(ApiResponse::success(StatusCode::OK, "Device token registered", token))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/device-tokens",
    tag = "Device Tokens",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Tokens, most recently seen first", body = [DeviceToken])
    )
)]
pub async fn list_device_tokens(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<DeviceToken>> {
    let tokens = state.store.list_device_tokens(user_id).await?;

    Ok(ApiResponse::success(StatusCode::OK, "Device tokens fetched", tokens))
}
