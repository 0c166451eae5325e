// src/db/queries/notification.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::PgStore;
use crate::db::models::notification::{NewNotification, NotificationEvent, NotificationQueueEntry};
use crate::db::store::{NotificationQueue, StoreResult};

#[derive(FromRow)]
struct NotificationRow {
    id: i64,
    organization_id: Option<Uuid>,
    task_id: Option<Uuid>,
    assignment_id: Option<Uuid>,
    event_type: String,
    payload: Value,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for NotificationQueueEntry {
    fn from(row: NotificationRow) -> Self {
        NotificationQueueEntry {
            id: row.id,
            organization_id: row.organization_id,
            task_id: row.task_id,
            assignment_id: row.assignment_id,
            event: NotificationEvent::from_parts(&row.event_type, row.payload),
            created_at: row.created_at,
            processed_at: row.processed_at,
        }
    }
}

#[async_trait]
impl NotificationQueue for PgStore {
    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO notification_queue (
                organization_id, task_id, assignment_id, event_type, payload
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(notification.organization_id)
        .bind(notification.task_id)
        .bind(notification.assignment_id)
        .bind(notification.event.event_type())
        .bind(notification.event.payload())
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> StoreResult<Vec<i64>> {
        if notifications.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO notification_queue (organization_id, task_id, assignment_id, event_type, payload) ",
        );
        builder.push_values(notifications, |mut row, notification| {
            row.push_bind(notification.organization_id)
                .push_bind(notification.task_id)
                .push_bind(notification.assignment_id)
                .push_bind(notification.event.event_type().to_string())
                .push_bind(notification.event.payload());
        });
        builder.push(" RETURNING id");

        let ids = builder
            .build_query_scalar::<i64>()
            .fetch_all(self.pool())
            .await?;

        Ok(ids)
    }

    async fn select_unprocessed_notifications(
        &self,
        limit: i64,
    ) -> StoreResult<Vec<NotificationQueueEntry>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT q.id, q.organization_id, q.task_id, q.assignment_id, q.event_type,
                   q.payload, q.created_at, q.processed_at
            FROM notification_queue q
            WHERE q.processed_at IS NULL
              AND EXISTS (SELECT 1 FROM assignments a WHERE a.id = q.assignment_id)
            ORDER BY q.created_at ASC, q.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(NotificationQueueEntry::from).collect())
    }

    async fn mark_notification_processed(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE notification_queue SET processed_at = $2 WHERE id = $1 AND processed_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
