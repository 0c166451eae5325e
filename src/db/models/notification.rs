// src/db/models/notification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use super::assignment::{AssignmentStatus, ReviewStatus};

/// Common notification types written to `notification_queue.event_type`
pub mod event_types {
    pub const ASSIGNMENT_CREATED: &str = "assignment_created";
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const REVIEW_UPDATED: &str = "review_updated";
    pub const DUE_REMINDER: &str = "due_reminder";
    pub const OVERDUE_REMINDER: &str = "overdue_reminder";
}

/// A queued fact about an assignment.
///
/// Persisted as an `event_type` string plus a JSON `payload`. Known event
/// types decode into their own variant; anything else (or a known type whose
/// payload does not match) is kept verbatim in [`NotificationEvent::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    AssignmentCreated {
        assignee_id: Uuid,
    },
    StatusChanged {
        assignee_id: Uuid,
        old_status: AssignmentStatus,
        new_status: AssignmentStatus,
    },
    ReviewUpdated {
        assignee_id: Uuid,
        old_review_status: ReviewStatus,
        new_review_status: ReviewStatus,
    },
    DueReminder {
        assignee_id: Uuid,
    },
    OverdueReminder {
        assignee_id: Uuid,
    },
    Other {
        event_type: String,
        payload: Value,
    },
}

#[derive(Deserialize)]
struct AssigneePayload {
    assignee_id: Uuid,
}

#[derive(Deserialize)]
struct StatusChangedPayload {
    assignee_id: Uuid,
    old_status: AssignmentStatus,
    new_status: AssignmentStatus,
}

#[derive(Deserialize)]
struct ReviewUpdatedPayload {
    assignee_id: Uuid,
    old_review_status: ReviewStatus,
    new_review_status: ReviewStatus,
}

impl NotificationEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::AssignmentCreated { .. } => event_types::ASSIGNMENT_CREATED,
            Self::StatusChanged { .. } => event_types::STATUS_CHANGED,
            Self::ReviewUpdated { .. } => event_types::REVIEW_UPDATED,
            Self::DueReminder { .. } => event_types::DUE_REMINDER,
            Self::OverdueReminder { .. } => event_types::OVERDUE_REMINDER,
            Self::Other { event_type, .. } => event_type,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::AssignmentCreated { assignee_id }
            | Self::DueReminder { assignee_id }
            | Self::OverdueReminder { assignee_id } => json!({ "assignee_id": assignee_id }),
            Self::StatusChanged {
                assignee_id,
                old_status,
                new_status,
            } => json!({
                "assignee_id": assignee_id,
                "old_status": old_status,
                "new_status": new_status,
            }),
            Self::ReviewUpdated {
                assignee_id,
                old_review_status,
                new_review_status,
            } => json!({
                "assignee_id": assignee_id,
                "old_review_status": old_review_status,
                "new_review_status": new_review_status,
            }),
            Self::Other { payload, .. } => payload.clone(),
        }
    }

    /// Rebuilds an event from its stored `(event_type, payload)` pair.
    pub fn from_parts(event_type: &str, payload: Value) -> Self {
        let decoded = match event_type {
            event_types::ASSIGNMENT_CREATED => serde_json::from_value::<AssigneePayload>(payload.clone())
                .ok()
                .map(|p| Self::AssignmentCreated { assignee_id: p.assignee_id }),
            event_types::STATUS_CHANGED => serde_json::from_value::<StatusChangedPayload>(payload.clone())
                .ok()
                .map(|p| Self::StatusChanged {
                    assignee_id: p.assignee_id,
                    old_status: p.old_status,
                    new_status: p.new_status,
                }),
            event_types::REVIEW_UPDATED => serde_json::from_value::<ReviewUpdatedPayload>(payload.clone())
                .ok()
                .map(|p| Self::ReviewUpdated {
                    assignee_id: p.assignee_id,
                    old_review_status: p.old_review_status,
                    new_review_status: p.new_review_status,
                }),
            event_types::DUE_REMINDER => serde_json::from_value::<AssigneePayload>(payload.clone())
                .ok()
                .map(|p| Self::DueReminder { assignee_id: p.assignee_id }),
            event_types::OVERDUE_REMINDER => serde_json::from_value::<AssigneePayload>(payload.clone())
                .ok()
                .map(|p| Self::OverdueReminder { assignee_id: p.assignee_id }),
            _ => None,
        };

        decoded.unwrap_or_else(|| Self::Other {
            event_type: event_type.to_string(),
            payload,
        })
    }

    pub fn assignee_id(&self) -> Option<Uuid> {
        match self {
            Self::AssignmentCreated { assignee_id }
            | Self::StatusChanged { assignee_id, .. }
            | Self::ReviewUpdated { assignee_id, .. }
            | Self::DueReminder { assignee_id }
            | Self::OverdueReminder { assignee_id } => Some(*assignee_id),
            Self::Other { payload, .. } => payload
                .get("assignee_id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok()),
        }
    }
}

/// One row of `notification_queue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQueueEntry {
    pub id: i64,
    pub organization_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub assignment_id: Option<Uuid>,
    pub event: NotificationEvent,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub organization_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub assignment_id: Option<Uuid>,
    pub event: NotificationEvent,
}

impl NewNotification {
    pub fn for_assignment(
        organization_id: Uuid,
        task_id: Uuid,
        assignment_id: Uuid,
        event: NotificationEvent,
    ) -> Self {
        Self {
            organization_id: Some(organization_id),
            task_id: Some(task_id),
            assignment_id: Some(assignment_id),
            event,
        }
    }
}

/// Everything the dispatch worker needs to render a message for one
/// assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentContext {
    pub assignment_id: Uuid,
    pub task_id: Uuid,
    pub organization_id: Uuid,
    pub assignee_id: Uuid,
    pub status: AssignmentStatus,
    pub review_status: ReviewStatus,
    pub review_note: Option<String>,
    pub task_title: String,
    pub task_due_at: Option<DateTime<Utc>>,
    pub assignee_email: Option<String>,
    pub assignee_name: Option<String>,
}

/// Body accepted by the enqueue trigger.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct EnqueueRequest {
    pub event_type: Option<String>,
    pub organization_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub assignment_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub payload: Option<Value>,
}
