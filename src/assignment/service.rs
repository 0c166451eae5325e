//! Assignment mutations: load, apply the state machine, persist, enqueue.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::state::TransitionError;
use crate::db::models::assignment::{Assignment, ReviewDecision, StatusChange};
use crate::db::models::notification::{NewNotification, NotificationEvent};
use crate::db::models::task::{PublishTask, PublishedTask, Task};
use crate::db::store::{AssignmentRepository, Store, StoreError};
use crate::utils::notification::NotificationEnqueuer;

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Assignment {0} not found")]
    AssignmentNotFound(Uuid),

    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    #[error("Task title must not be empty")]
    EmptyTitle,

    #[error("No assignees selected for this task")]
    NoAssignees,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn Store>,
    enqueuer: NotificationEnqueuer,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn Store>, enqueuer: NotificationEnqueuer) -> Self {
        Self { store, enqueuer }
    }

    /// Creates a task and one `sent` assignment per resolved assignee.
    pub async fn publish_task(
        &self,
        request: PublishTask,
        now: DateTime<Utc>,
    ) -> Result<PublishedTask, AssignmentError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(AssignmentError::EmptyTitle);
        }

        let assignees = self.resolve_assignees(&request).await?;
        if assignees.is_empty() {
            return Err(AssignmentError::NoAssignees);
        }

        let task = Task {
            id: Uuid::new_v4(),
            organization_id: request.organization_id,
            group_id: request.group_id,
            title: title.to_string(),
            description: request.description,
            due_at: request.due_at,
            require_attachment: request.require_attachment,
            created_by: request.created_by,
            created_at: now,
        };
        let assignments: Vec<Assignment> = assignees
            .iter()
            .map(|assignee_id| Assignment::new(task.id, *assignee_id, now))
            .collect();

        self.store.insert_task(&task, &assignments).await?;

        for assignment in &assignments {
            self.enqueuer.enqueue(NewNotification::for_assignment(
                task.organization_id,
                task.id,
                assignment.id,
                NotificationEvent::AssignmentCreated {
                    assignee_id: assignment.assignee_id,
                },
            ));
        }

        tracing::info!(
            task_id = %task.id,
            assignees = assignments.len(),
            "task published"
        );
        Ok(PublishedTask { task, assignments })
    }

    async fn resolve_assignees(&self, request: &PublishTask) -> Result<Vec<Uuid>, AssignmentError> {
        let mut seen = HashSet::new();
        let mut selected: Vec<Uuid> = request
            .assignee_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if request.tag_ids.is_empty() {
            return Ok(selected);
        }

        let tagged = self
            .store
            .members_with_tags(request.group_id, &request.tag_ids)
            .await?;
        if selected.is_empty() {
            return Ok(tagged);
        }

        let tagged: HashSet<Uuid> = tagged.into_iter().collect();
        selected.retain(|id| tagged.contains(id));
        Ok(selected)
    }

    /// Assignee-side status change.
    pub async fn change_status(
        &self,
        assignment_id: Uuid,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AssignmentError> {
        let (mut assignment, task) = self.load(assignment_id).await?;

        let event = assignment.apply_status_change(&change, task.require_attachment, now)?;
        self.store.update_assignment(&assignment).await?;
        self.emit(&task, &assignment, event);

        Ok(assignment)
    }

    /// Reviewer decision on a submitted assignment.
    pub async fn review(
        &self,
        assignment_id: Uuid,
        decision: ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AssignmentError> {
        let (mut assignment, task) = self.load(assignment_id).await?;

        let event = assignment.apply_review(&decision, now)?;
        self.store.update_assignment(&assignment).await?;
        self.emit(&task, &assignment, event);

        Ok(assignment)
    }

    /// Moves the due date and clears reminder markers so reminders fire again
    /// against the new deadline.
    pub async fn reschedule_task(
        &self,
        task_id: Uuid,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AssignmentError> {
        match self.store.reschedule_task(task_id, due_at).await {
            Ok(reset) => {
                tracing::info!(task_id = %task_id, reset, "task rescheduled");
                Ok(reset)
            }
            Err(StoreError::NotFound(_)) => Err(AssignmentError::TaskNotFound(task_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, assignment_id: Uuid) -> Result<(Assignment, Task), AssignmentError> {
        let assignment = self
            .store
            .fetch_assignment(assignment_id)
            .await?
            .ok_or(AssignmentError::AssignmentNotFound(assignment_id))?;
        let task = self
            .store
            .fetch_task(assignment.task_id)
            .await?
            .ok_or(AssignmentError::TaskNotFound(assignment.task_id))?;
        Ok((assignment, task))
    }

    fn emit(&self, task: &Task, assignment: &Assignment, event: NotificationEvent) {
        self.enqueuer.enqueue(NewNotification::for_assignment(
            task.organization_id,
            task.id,
            assignment.id,
            event,
        ));
    }
}
