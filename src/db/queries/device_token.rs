// src/db/queries/device_token.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::db::models::device_token::{DeviceToken, NewDeviceToken};
use crate::db::store::{DeviceTokenRegistry, StoreResult};

#[async_trait]
impl DeviceTokenRegistry for PgStore {
    async fn register_device_token(
        &self,
        token: &NewDeviceToken,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<DeviceToken> {
        let registered = sqlx::query_as::<_, DeviceToken>(
            r#"
            INSERT INTO device_tokens (user_id, token, platform, device_name, last_seen_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, token) DO UPDATE SET
                platform = EXCLUDED.platform,
                device_name = EXCLUDED.device_name,
                last_seen_at = EXCLUDED.last_seen_at
            RETURNING user_id, token, platform, device_name, last_seen_at
            "#,
        )
        .bind(token.user_id)
        .bind(&token.token)
        .bind(&token.platform)
        .bind(&token.device_name)
        .bind(seen_at)
        .fetch_one(self.pool())
        .await?;

        Ok(registered)
    }

    async fn list_device_tokens(&self, user_id: Uuid) -> StoreResult<Vec<DeviceToken>> {
        let tokens = sqlx::query_as::<_, DeviceToken>(
            r#"
            SELECT user_id, token, platform, device_name, last_seen_at
            FROM device_tokens
            WHERE user_id = $1
            ORDER BY last_seen_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(tokens)
    }
}
