//! Data-access ports used by the assignment service and the workers.
//!
//! `PgStore` (see `db::queries`) implements them against Postgres and
//! the test-only `InMemoryStore` (see `db::memory`) in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::assignment::{Assignment, ReminderCandidate, ReminderKind};
use crate::db::models::device_token::{DeviceToken, NewDeviceToken};
use crate::db::models::notification::{AssignmentContext, NewNotification, NotificationQueueEntry};
use crate::db::models::task::Task;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to decode {entity}: {reason}")]
    Decode { entity: &'static str, reason: String },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Tasks, assignments and the reminder markers on them.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Round-trip used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;

    /// Inserts a task and its assignments in one transaction.
    async fn insert_task(&self, task: &Task, assignments: &[Assignment]) -> StoreResult<()>;

    async fn fetch_task(&self, task_id: Uuid) -> StoreResult<Option<Task>>;

    /// Members of `group_id` carrying at least one of `tag_ids`.
    async fn members_with_tags(&self, group_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<Vec<Uuid>>;

    async fn fetch_assignment(&self, assignment_id: Uuid) -> StoreResult<Option<Assignment>>;

    /// Writes the status, review and timestamp fields of an assignment.
    ///
    /// Returns [`StoreError::NotFound`] when the row does not exist.
    async fn update_assignment(&self, assignment: &Assignment) -> StoreResult<()>;

    /// Sets a new due date and clears both reminder markers of every
    /// assignment of the task. Returns the number of assignments reset.
    async fn reschedule_task(
        &self,
        task_id: Uuid,
        due_at: Option<DateTime<Utc>>,
    ) -> StoreResult<u64>;

    /// Open assignments due within `[now, horizon]` without a due marker.
    async fn select_due_soon_assignments(
        &self,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>>;

    /// Open assignments due before `now` without an overdue marker.
    async fn select_overdue_assignments(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>>;

    /// Sets the marker column for `kind` on rows where it is still null.
    async fn update_reminder_marker(
        &self,
        assignment_ids: &[Uuid],
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn fetch_assignment_context(
        &self,
        assignment_id: Uuid,
    ) -> StoreResult<Option<AssignmentContext>>;
}

/// The `notification_queue` table.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<i64>;

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> StoreResult<Vec<i64>>;

    /// Oldest-first rows with `processed_at IS NULL` whose assignment still
    /// exists. Rows that can never resolve stay queued but are not polled.
    async fn select_unprocessed_notifications(
        &self,
        limit: i64,
    ) -> StoreResult<Vec<NotificationQueueEntry>>;

    /// Sets `processed_at` if still null. Returns whether this call set it.
    async fn mark_notification_processed(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool>;
}

/// Per-user push tokens.
#[async_trait]
pub trait DeviceTokenRegistry: Send + Sync {
    /// Upserts on `(user_id, token)` and refreshes `last_seen_at`.
    async fn register_device_token(
        &self,
        token: &NewDeviceToken,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<DeviceToken>;

    /// Most recently seen first.
    async fn list_device_tokens(&self, user_id: Uuid) -> StoreResult<Vec<DeviceToken>>;
}

pub trait Store: AssignmentRepository + NotificationQueue + DeviceTokenRegistry {}

impl<T> Store for T where T: AssignmentRepository + NotificationQueue + DeviceTokenRegistry {}
