// src/db/models/device_token.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct DeviceToken {
    pub user_id: Uuid,
    pub token: String,
    pub platform: Option<String>,
    pub device_name: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Clone)]
pub struct NewDeviceToken {
    pub user_id: Uuid,
    pub token: String,
    pub platform: Option<String>,
    pub device_name: Option<String>,
}
