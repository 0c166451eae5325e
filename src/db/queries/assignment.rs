// src/db/queries/assignment.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::PgStore;
use crate::db::models::assignment::{
    Assignment, AssignmentStatus, ReminderCandidate, ReminderKind, ReviewStatus,
};
use crate::db::models::notification::AssignmentContext;
use crate::db::models::task::Task;
use crate::db::store::{AssignmentRepository, StoreError, StoreResult};

const ASSIGNMENT_COLUMNS: &str = r#"
    id, task_id, assignee_id, status, completion_note, attachments,
    review_status, review_note, reviewed_at, reviewed_by,
    received_at, completed_at, due_reminder_sent_at, overdue_reminder_sent_at,
    created_at, updated_at
"#;

// Assignments that can still be reminded about.
const OPEN_ASSIGNMENT_FILTER: &str = r#"
    a.status NOT IN ('completed', 'archived')
    AND a.review_status <> 'accepted'
"#;

#[derive(FromRow)]
struct AssignmentRow {
    id: Uuid,
    task_id: Uuid,
    assignee_id: Uuid,
    status: String,
    completion_note: Option<String>,
    attachments: Vec<String>,
    review_status: String,
    review_note: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
    received_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    due_reminder_sent_at: Option<DateTime<Utc>>,
    overdue_reminder_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = StoreError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        Ok(Assignment {
            id: row.id,
            task_id: row.task_id,
            assignee_id: row.assignee_id,
            status: decode_status(&row.status)?,
            completion_note: row.completion_note,
            attachments: row.attachments,
            review_status: decode_review_status(&row.review_status)?,
            review_note: row.review_note,
            reviewed_at: row.reviewed_at,
            reviewed_by: row.reviewed_by,
            received_at: row.received_at,
            completed_at: row.completed_at,
            due_reminder_sent_at: row.due_reminder_sent_at,
            overdue_reminder_sent_at: row.overdue_reminder_sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ContextRow {
    assignment_id: Uuid,
    task_id: Uuid,
    organization_id: Uuid,
    assignee_id: Uuid,
    status: String,
    review_status: String,
    review_note: Option<String>,
    task_title: String,
    task_due_at: Option<DateTime<Utc>>,
    assignee_email: Option<String>,
    assignee_name: Option<String>,
}

impl TryFrom<ContextRow> for AssignmentContext {
    type Error = StoreError;

    fn try_from(row: ContextRow) -> Result<Self, Self::Error> {
        Ok(AssignmentContext {
            assignment_id: row.assignment_id,
            task_id: row.task_id,
            organization_id: row.organization_id,
            assignee_id: row.assignee_id,
            status: decode_status(&row.status)?,
            review_status: decode_review_status(&row.review_status)?,
            review_note: row.review_note,
            task_title: row.task_title,
            task_due_at: row.task_due_at,
            assignee_email: row.assignee_email,
            assignee_name: row.assignee_name,
        })
    }
}

fn decode_status(raw: &str) -> StoreResult<AssignmentStatus> {
    AssignmentStatus::parse(raw).ok_or_else(|| StoreError::Decode {
        entity: "assignment status",
        reason: format!("unknown value '{raw}'"),
    })
}

fn decode_review_status(raw: &str) -> StoreResult<ReviewStatus> {
    ReviewStatus::parse(raw).ok_or_else(|| StoreError::Decode {
        entity: "review status",
        reason: format!("unknown value '{raw}'"),
    })
}

#[async_trait]
impl AssignmentRepository for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }

    async fn insert_task(&self, task: &Task, assignments: &[Assignment]) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, organization_id, group_id, title, description,
                due_at, require_attachment, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(task.id)
        .bind(task.organization_id)
        .bind(task.group_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_at)
        .bind(task.require_attachment)
        .bind(task.created_by)
        .bind(task.created_at)
        .execute(&mut *tx)
        .await?;

        if !assignments.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO assignments (id, task_id, assignee_id, status, review_status, attachments, created_at, updated_at) ",
            );
            builder.push_values(assignments, |mut row, assignment| {
                row.push_bind(assignment.id)
                    .push_bind(assignment.task_id)
                    .push_bind(assignment.assignee_id)
                    .push_bind(assignment.status.as_str())
                    .push_bind(assignment.review_status.as_str())
                    .push_bind(assignment.attachments.clone())
                    .push_bind(assignment.created_at)
                    .push_bind(assignment.updated_at);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, organization_id, group_id, title, description,
                   due_at, require_attachment, created_by, created_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(task)
    }

    async fn members_with_tags(&self, group_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let members = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT mt.user_id
            FROM member_tags mt
            JOIN group_members gm ON gm.group_id = mt.group_id AND gm.user_id = mt.user_id
            WHERE mt.group_id = $1 AND mt.tag_id = ANY($2)
            "#,
        )
        .bind(group_id)
        .bind(tag_ids)
        .fetch_all(self.pool())
        .await?;

        Ok(members)
    }

    async fn fetch_assignment(&self, assignment_id: Uuid) -> StoreResult<Option<Assignment>> {
        let query = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1");
        let row = sqlx::query_as::<_, AssignmentRow>(&query)
            .bind(assignment_id)
            .fetch_optional(self.pool())
            .await?;

        row.map(Assignment::try_from).transpose()
    }

    async fn update_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        // Reminder markers belong to the scheduler; they are only written here
        // when a reset to `sent` clears them.
        let result = sqlx::query(
            r#"
            UPDATE assignments SET
                status = $2,
                completion_note = $3,
                attachments = $4,
                review_status = $5,
                review_note = $6,
                reviewed_at = $7,
                reviewed_by = $8,
                received_at = $9,
                completed_at = $10,
                due_reminder_sent_at = CASE WHEN $2 = 'sent' THEN NULL ELSE due_reminder_sent_at END,
                overdue_reminder_sent_at = CASE WHEN $2 = 'sent' THEN NULL ELSE overdue_reminder_sent_at END,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.status.as_str())
        .bind(&assignment.completion_note)
        .bind(&assignment.attachments)
        .bind(assignment.review_status.as_str())
        .bind(&assignment.review_note)
        .bind(assignment.reviewed_at)
        .bind(assignment.reviewed_by)
        .bind(assignment.received_at)
        .bind(assignment.completed_at)
        .bind(assignment.updated_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("assignment {}", assignment.id)));
        }
        Ok(())
    }

    async fn reschedule_task(
        &self,
        task_id: Uuid,
        due_at: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query("UPDATE tasks SET due_at = $2 WHERE id = $1")
            .bind(task_id)
            .bind(due_at)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("task {task_id}")));
        }

        let reset = sqlx::query(
            r#"
            UPDATE assignments
            SET due_reminder_sent_at = NULL, overdue_reminder_sent_at = NULL
            WHERE task_id = $1
            "#,
        )
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reset.rows_affected())
    }

    async fn select_due_soon_assignments(
        &self,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>> {
        let query = format!(
            r#"
            SELECT a.id AS assignment_id, a.task_id, t.organization_id, a.assignee_id, t.due_at
            FROM assignments a
            JOIN tasks t ON t.id = a.task_id
            WHERE {OPEN_ASSIGNMENT_FILTER}
              AND t.due_at >= $1
              AND t.due_at <= $2
              AND a.due_reminder_sent_at IS NULL
            ORDER BY t.due_at ASC, a.id ASC
            "#
        );

        let candidates = sqlx::query_as::<_, ReminderCandidate>(&query)
            .bind(now)
            .bind(horizon)
            .fetch_all(self.pool())
            .await?;

        Ok(candidates)
    }

    async fn select_overdue_assignments(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>> {
        let query = format!(
            r#"
            SELECT a.id AS assignment_id, a.task_id, t.organization_id, a.assignee_id, t.due_at
            FROM assignments a
            JOIN tasks t ON t.id = a.task_id
            WHERE {OPEN_ASSIGNMENT_FILTER}
              AND t.due_at < $1
              AND a.overdue_reminder_sent_at IS NULL
            ORDER BY t.due_at ASC, a.id ASC
            "#
        );

        let candidates = sqlx::query_as::<_, ReminderCandidate>(&query)
            .bind(now)
            .fetch_all(self.pool())
            .await?;

        Ok(candidates)
    }

    async fn update_reminder_marker(
        &self,
        assignment_ids: &[Uuid],
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if assignment_ids.is_empty() {
            return Ok(0);
        }

        let column = kind.marker_column();
        let query = format!(
            "UPDATE assignments SET {column} = $1 WHERE id = ANY($2) AND {column} IS NULL"
        );
        let result = sqlx::query(&query)
            .bind(at)
            .bind(assignment_ids)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    async fn fetch_assignment_context(
        &self,
        assignment_id: Uuid,
    ) -> StoreResult<Option<AssignmentContext>> {
        let row = sqlx::query_as::<_, ContextRow>(
            r#"
            SELECT a.id AS assignment_id,
                   a.task_id,
                   t.organization_id,
                   a.assignee_id,
                   a.status,
                   a.review_status,
                   a.review_note,
                   t.title AS task_title,
                   t.due_at AS task_due_at,
                   p.email AS assignee_email,
                   p.display_name AS assignee_name
            FROM assignments a
            JOIN tasks t ON t.id = a.task_id
            LEFT JOIN profiles p ON p.id = a.assignee_id
            WHERE a.id = $1
            "#,
        )
        .bind(assignment_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(AssignmentContext::try_from).transpose()
    }
}
