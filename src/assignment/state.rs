//! Legal moves of an assignment's `status` and `review_status`.
//!
//! ```text
//! sent ──▶ received ──▶ completed
//!  ▲  ◀──────┘  ▲  ◀────────┤ (reopen)
//!  └────────────┼───────────┘ (reset)
//!  any active ──▶ archived ──▶ received
//! ```
//!
//! Review decisions are only possible while `completed`. Leaving `completed`
//! for `received` or `sent` resets the review to `pending`; so does a
//! resubmission after changes were requested.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::assignment::{
    Assignment, AssignmentStatus, ReviewDecision, ReviewStatus, StatusChange,
};
use crate::db::models::notification::NotificationEvent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot move assignment from {from} to {to}")]
    InvalidStatusTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    #[error("Not yet submitted, cannot review (status is {status})")]
    NotSubmitted { status: AssignmentStatus },

    #[error("Please supply a note when requesting changes")]
    ReviewNoteRequired,

    #[error("{0} is not a review decision")]
    InvalidReviewTarget(ReviewStatus),

    #[error("Review status is already {0}")]
    ReviewUnchanged(ReviewStatus),

    #[error("This task requires an attachment before it can be completed")]
    AttachmentRequired,
}

impl TransitionError {
    /// Errors caused by missing or malformed input rather than the current
    /// state of the assignment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ReviewNoteRequired | Self::AttachmentRequired | Self::InvalidReviewTarget(_)
        )
    }
}

impl AssignmentStatus {
    pub fn can_transition_to(self, to: AssignmentStatus) -> bool {
        use AssignmentStatus::{Archived, Completed, Received, Sent};

        matches!(
            (self, to),
            (Sent, Received)
                | (Sent, Archived)
                | (Received, Completed)
                | (Received, Sent)
                | (Received, Archived)
                | (Completed, Received)
                | (Completed, Sent)
                | (Completed, Archived)
                | (Archived, Received)
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

impl Assignment {
    /// Applies an assignee-side status change.
    ///
    /// On error the assignment is left untouched.
    pub fn apply_status_change(
        &mut self,
        change: &StatusChange,
        require_attachment: bool,
        now: DateTime<Utc>,
    ) -> Result<NotificationEvent, TransitionError> {
        let from = self.status;
        let to = change.status;
        let resubmission = from == AssignmentStatus::Completed
            && to == AssignmentStatus::Completed
            && self.review_status == ReviewStatus::ChangesRequested;

        if !resubmission && !from.can_transition_to(to) {
            return Err(TransitionError::InvalidStatusTransition { from, to });
        }
        if to == AssignmentStatus::Completed
            && require_attachment
            && change.attachments.is_empty()
            && self.attachments.is_empty()
        {
            return Err(TransitionError::AttachmentRequired);
        }

        match to {
            AssignmentStatus::Received => {
                if from == AssignmentStatus::Sent || self.received_at.is_none() {
                    self.received_at = Some(now);
                }
                self.completed_at = None;
                self.reset_review();
            }
            AssignmentStatus::Completed => {
                self.completed_at = Some(now);
                if let Some(note) = change.completion_note.as_deref() {
                    self.completion_note = non_blank(Some(note));
                }
                if !change.attachments.is_empty() {
                    self.attachments = change.attachments.clone();
                }
                if self.review_status == ReviewStatus::ChangesRequested {
                    self.reset_review();
                }
            }
            AssignmentStatus::Sent => {
                self.received_at = None;
                self.completed_at = None;
                self.reset_review();
                self.review_note = None;
                self.due_reminder_sent_at = None;
                self.overdue_reminder_sent_at = None;
            }
            AssignmentStatus::Archived => {
                self.completed_at = None;
                self.reset_review();
            }
        }

        self.status = to;
        self.updated_at = now;

        Ok(NotificationEvent::StatusChanged {
            assignee_id: self.assignee_id,
            old_status: from,
            new_status: to,
        })
    }

    /// Applies a reviewer decision (`accepted` or `changes_requested`).
    pub fn apply_review(
        &mut self,
        decision: &ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<NotificationEvent, TransitionError> {
        let target = decision.review_status;
        if target == ReviewStatus::Pending {
            return Err(TransitionError::InvalidReviewTarget(target));
        }
        if self.status != AssignmentStatus::Completed {
            return Err(TransitionError::NotSubmitted {
                status: self.status,
            });
        }

        let note = non_blank(decision.review_note.as_deref());
        if target == ReviewStatus::ChangesRequested && note.is_none() {
            return Err(TransitionError::ReviewNoteRequired);
        }
        if target == self.review_status {
            return Err(TransitionError::ReviewUnchanged(target));
        }

        let old_review_status = self.review_status;
        self.review_status = target;
        self.review_note = note;
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(decision.reviewer_id);
        self.updated_at = now;

        Ok(NotificationEvent::ReviewUpdated {
            assignee_id: self.assignee_id,
            old_review_status,
            new_review_status: target,
        })
    }

    // The review note is kept so a reopened assignment still shows what the
    // reviewer asked for.
    fn reset_review(&mut self) {
        self.review_status = ReviewStatus::Pending;
        self.reviewed_at = None;
        self.reviewed_by = None;
    }
}
