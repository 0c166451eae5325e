// src/db/models/assignment.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Progress of one member on one task.
///
/// Stored as `sent | received | completed | archived`. Older clients write
/// `pending` and `in_progress`, which are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[serde(alias = "pending")]
    Sent,
    #[serde(alias = "in_progress")]
    Received,
    Completed,
    Archived,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 4] = [
        AssignmentStatus::Sent,
        AssignmentStatus::Received,
        AssignmentStatus::Completed,
        AssignmentStatus::Archived,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Human-readable label used in emails and push messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sent => "Pending",
            Self::Received => "In progress",
            Self::Completed => "Completed",
            Self::Archived => "Archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sent" | "pending" => Some(Self::Sent),
            "received" | "in_progress" => Some(Self::Received),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer verdict on a submitted assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    ChangesRequested,
}

impl ReviewStatus {
    pub const ALL: [ReviewStatus; 3] = [
        ReviewStatus::Pending,
        ReviewStatus::Accepted,
        ReviewStatus::ChangesRequested,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::ChangesRequested => "changes_requested",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending review",
            Self::Accepted => "Accepted",
            Self::ChangesRequested => "Changes requested",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "changes_requested" => Some(Self::ChangesRequested),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub assignee_id: Uuid,
    pub status: AssignmentStatus,
    pub completion_note: Option<String>,
    /// Object-storage keys of files attached on completion.
    pub attachments: Vec<String>,
    pub review_status: ReviewStatus,
    pub review_note: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_reminder_sent_at: Option<DateTime<Utc>>,
    pub overdue_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// A freshly published assignment: `sent`, review `pending`.
    pub fn new(task_id: Uuid, assignee_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            assignee_id,
            status: AssignmentStatus::Sent,
            completion_note: None,
            attachments: Vec::new(),
            review_status: ReviewStatus::Pending,
            review_note: None,
            reviewed_at: None,
            reviewed_by: None,
            received_at: None,
            completed_at: None,
            due_reminder_sent_at: None,
            overdue_reminder_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Assignee-side mutation: move to `status`, optionally with a completion
/// note and attachments.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct StatusChange {
    pub status: AssignmentStatus,
    pub completion_note: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl StatusChange {
    pub fn to(status: AssignmentStatus) -> Self {
        Self {
            status,
            completion_note: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.completion_note = Some(note.into());
        self
    }

    pub fn with_attachment(mut self, key: impl Into<String>) -> Self {
        self.attachments.push(key.into());
        self
    }
}

/// Reviewer-side mutation.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ReviewDecision {
    pub review_status: ReviewStatus,
    pub review_note: Option<String>,
    pub reviewer_id: Uuid,
}

/// Which reminder marker a scheduler pass works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    DueSoon,
    Overdue,
}

impl ReminderKind {
    pub const fn marker_column(self) -> &'static str {
        match self {
            Self::DueSoon => "due_reminder_sent_at",
            Self::Overdue => "overdue_reminder_sent_at",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DueSoon => "due_soon",
            Self::Overdue => "overdue",
        }
    }
}

/// An assignment selected by the reminder scheduler.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ReminderCandidate {
    pub assignment_id: Uuid,
    pub task_id: Uuid,
    pub organization_id: Uuid,
    pub assignee_id: Uuid,
    pub due_at: DateTime<Utc>,
}
