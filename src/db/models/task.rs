// src/db/models/task.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::assignment::Assignment;

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub require_attachment: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// ✅ **Publish request (group admin sends this)**
#[derive(Debug, Deserialize, Serialize, ToSchema, Clone)]
pub struct PublishTask {
    pub organization_id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub require_attachment: bool,
    pub created_by: Uuid,
    /// Explicitly selected members.
    #[serde(default)]
    pub assignee_ids: Vec<Uuid>,
    /// When non-empty, only group members carrying one of these tags are
    /// assigned.
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PublishedTask {
    pub task: Task,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Clone)]
pub struct RescheduleTask {
    pub due_at: Option<DateTime<Utc>>,
}
