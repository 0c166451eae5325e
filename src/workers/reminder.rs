use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::assignment::{ReminderCandidate, ReminderKind};
use crate::db::models::notification::{NewNotification, NotificationEvent};
use crate::db::store::{AssignmentRepository, NotificationQueue, Store};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSummary {
    pub due_queued: usize,
    pub overdue_queued: usize,
}

/// Queues `due_reminder` / `overdue_reminder` rows for open assignments and
/// stamps their markers so the next run skips them.
#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<dyn Store>,
    horizon: Duration,
    batch_size: usize,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn Store>, horizon: Duration, batch_size: usize) -> Self {
        Self {
            store,
            horizon,
            batch_size: batch_size.max(1),
        }
    }

    /// Never fails: a category whose read fails counts zero.
    pub async fn run(&self, now: DateTime<Utc>) -> ReminderSummary {
        let due_queued = match self
            .store
            .select_due_soon_assignments(now, now + self.horizon)
            .await
        {
            Ok(candidates) => self.queue(ReminderKind::DueSoon, &candidates, now).await,
            Err(e) => {
                tracing::error!(kind = "due_soon", error = %e, "failed to select reminder candidates");
                0
            }
        };

        let overdue_queued = match self.store.select_overdue_assignments(now).await {
            Ok(candidates) => self.queue(ReminderKind::Overdue, &candidates, now).await,
            Err(e) => {
                tracing::error!(kind = "overdue", error = %e, "failed to select reminder candidates");
                0
            }
        };

        let summary = ReminderSummary {
            due_queued,
            overdue_queued,
        };
        tracing::info!(due_queued, overdue_queued, "reminder run finished");
        summary
    }

    async fn queue(
        &self,
        kind: ReminderKind,
        candidates: &[ReminderCandidate],
        now: DateTime<Utc>,
    ) -> usize {
        let mut queued = 0;

        for batch in candidates.chunks(self.batch_size) {
            let rows: Vec<NewNotification> = batch
                .iter()
                .map(|c| {
                    NewNotification::for_assignment(
                        c.organization_id,
                        c.task_id,
                        c.assignment_id,
                        reminder_event(kind, c.assignee_id),
                    )
                })
                .collect();

            // Leave markers untouched when nothing was queued so the next run retries.
            match self.store.insert_notifications(&rows).await {
                Ok(ids) => queued += ids.len(),
                Err(e) => {
                    tracing::error!(
                        kind = kind.as_str(),
                        batch = rows.len(),
                        error = %e,
                        "failed to queue reminders"
                    );
                    continue;
                }
            }

            let ids: Vec<Uuid> = batch.iter().map(|c| c.assignment_id).collect();
            if let Err(e) = self.store.update_reminder_marker(&ids, kind, now).await {
                tracing::error!(
                    kind = kind.as_str(),
                    column = kind.marker_column(),
                    batch = ids.len(),
                    error = %e,
                    "failed to stamp reminder markers"
                );
            }
        }

        queued
    }
}

fn reminder_event(kind: ReminderKind, assignee_id: Uuid) -> NotificationEvent {
    match kind {
        ReminderKind::DueSoon => NotificationEvent::DueReminder { assignee_id },
        ReminderKind::Overdue => NotificationEvent::OverdueReminder { assignee_id },
    }
}
