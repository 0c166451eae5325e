use chrono::{DateTime, Utc};
use futures::{stream, FutureExt, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::render::{render, RenderedNotification};
use crate::db::models::notification::{AssignmentContext, NotificationQueueEntry};
use crate::db::store::{
    AssignmentRepository, DeviceTokenRegistry, NotificationQueue, Store, StoreError,
};
use crate::delivery::email::EmailChannel;
use crate::delivery::push::{is_valid_push_token, PushMessage, PushTransport};
use crate::delivery::DeliveryError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to read notification queue: {0}")]
    Queue(#[from] StoreError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Processed,
    Skipped,
}

/// Drains unprocessed queue rows: resolve, render, deliver, mark.
///
/// Delivery is best effort. A row whose assignment resolves is marked
/// processed whatever happens on the email and push channels; a row that
/// cannot be resolved is left for a later run.
#[derive(Clone)]
pub struct DispatchWorker {
    store: Arc<dyn Store>,
    email: Option<EmailChannel>,
    push: Option<Arc<dyn PushTransport>>,
    portal_base_url: Option<String>,
    batch_size: i64,
    concurrency: usize,
    timeout: Duration,
}

impl DispatchWorker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            email: None,
            push: None,
            portal_base_url: None,
            batch_size: 50,
            concurrency: 4,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_email(mut self, channel: EmailChannel) -> Self {
        self.email = Some(channel);
        self
    }

    pub fn with_push(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.push = Some(transport);
        self
    }

    pub fn with_portal_base_url(mut self, url: Option<String>) -> Self {
        self.portal_base_url = url;
        self
    }

    pub fn with_limits(mut self, batch_size: i64, concurrency: usize, timeout: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.concurrency = concurrency.max(1);
        self.timeout = timeout;
        self
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<DispatchSummary, DispatchError> {
        let rows = self
            .store
            .select_unprocessed_notifications(self.batch_size)
            .await?;
        let fetched = rows.len();

        let outcomes: Vec<RowOutcome> = stream::iter(rows)
            .map(|row| async move {
                let notification_id = row.id;
                match AssertUnwindSafe(self.process(row, now)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::error!(notification_id, "notification processing panicked");
                        RowOutcome::Skipped
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let processed = outcomes
            .iter()
            .filter(|outcome| **outcome == RowOutcome::Processed)
            .count();
        let summary = DispatchSummary {
            fetched,
            processed,
            skipped: fetched - processed,
        };
        tracing::info!(
            fetched = summary.fetched,
            processed = summary.processed,
            skipped = summary.skipped,
            "dispatch run finished"
        );
        Ok(summary)
    }

    async fn process(&self, row: NotificationQueueEntry, now: DateTime<Utc>) -> RowOutcome {
        let Some(assignment_id) = row.assignment_id else {
            tracing::warn!(notification_id = row.id, "notification has no assignment, skipping");
            return RowOutcome::Skipped;
        };

        let context = match self.store.fetch_assignment_context(assignment_id).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                tracing::warn!(
                    notification_id = row.id,
                    %assignment_id,
                    "assignment context not found, skipping"
                );
                return RowOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(
                    notification_id = row.id,
                    %assignment_id,
                    error = %e,
                    "failed to load assignment context"
                );
                return RowOutcome::Skipped;
            }
        };

        let rendered = render(&row.event, &context, self.portal_base_url.as_deref());
        self.send_email(row.id, &context, &rendered).await;
        self.send_push(row.id, &context, &rendered).await;

        match self.store.mark_notification_processed(row.id, now).await {
            Ok(true) => RowOutcome::Processed,
            Ok(false) => {
                tracing::debug!(notification_id = row.id, "notification already processed");
                RowOutcome::Skipped
            }
            Err(e) => {
                tracing::error!(
                    notification_id = row.id,
                    error = %e,
                    "failed to mark notification processed"
                );
                RowOutcome::Skipped
            }
        }
    }

    async fn send_email(
        &self,
        notification_id: i64,
        context: &AssignmentContext,
        rendered: &RenderedNotification,
    ) {
        let (Some(channel), Some(to)) = (&self.email, context.assignee_email.as_deref()) else {
            return;
        };

        match self
            .bounded(channel.send(to, &rendered.subject, &rendered.body))
            .await
        {
            Ok(()) => tracing::debug!(notification_id, "email sent"),
            Err(e) => tracing::warn!(
                notification_id,
                assignment_id = %context.assignment_id,
                error = %e,
                "email delivery failed"
            ),
        }
    }

    async fn send_push(
        &self,
        notification_id: i64,
        context: &AssignmentContext,
        rendered: &RenderedNotification,
    ) {
        let Some(transport) = &self.push else {
            return;
        };

        let tokens = match self.store.list_device_tokens(context.assignee_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(
                    notification_id,
                    assignee_id = %context.assignee_id,
                    error = %e,
                    "failed to load device tokens"
                );
                return;
            }
        };

        let messages: Vec<PushMessage> = tokens
            .into_iter()
            .filter(|t| is_valid_push_token(&t.token))
            .map(|t| PushMessage {
                to: t.token,
                sound: "default".to_string(),
                title: rendered.push_title.clone(),
                body: rendered.push_body.clone(),
                data: rendered.data.clone(),
            })
            .collect();
        if messages.is_empty() {
            return;
        }

        match self.bounded(transport.send(&messages)).await {
            Ok(()) => tracing::debug!(notification_id, devices = messages.len(), "push sent"),
            Err(e) => tracing::warn!(
                notification_id,
                assignment_id = %context.assignment_id,
                error = %e,
                "push delivery failed"
            ),
        }
    }

    async fn bounded<F>(&self, delivery: F) -> Result<(), DeliveryError>
    where
        F: Future<Output = Result<(), DeliveryError>>,
    {
        tokio::time::timeout(self.timeout, delivery)
            .await
            .unwrap_or(Err(DeliveryError::Timeout(self.timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{FailPoint, InMemoryStore};
    use crate::db::models::assignment::Assignment;
    use crate::db::models::device_token::NewDeviceToken;
    use crate::db::models::notification::{NewNotification, NotificationEvent};
    use crate::db::models::task::Task;
    use crate::delivery::testing::{RecordingMailer, RecordingPush};
    use serde_json::json;
    use uuid::Uuid;

    struct Harness {
        store: Arc<InMemoryStore>,
        mailer: Arc<RecordingMailer>,
        push: Arc<RecordingPush>,
        worker: DispatchWorker,
    }

    fn harness_with(mailer: RecordingMailer, push: RecordingPush) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(mailer);
        let push = Arc::new(push);
        let worker = DispatchWorker::new(store.clone())
            .with_email(EmailChannel::new(mailer.clone(), "tasks@example.com"))
            .with_push(push.clone())
            .with_portal_base_url(Some("https://portal.example.com".to_string()))
            .with_limits(50, 4, Duration::from_millis(100));
        Harness {
            store,
            mailer,
            push,
            worker,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingMailer::default(), RecordingPush::default())
    }

    impl Harness {
        /// Queues a row with no assignment attached.
        async fn queue_detached(&self, event_type: &str) -> i64 {
            self.store
                .insert_notification(&NewNotification {
                    organization_id: None,
                    task_id: None,
                    assignment_id: None,
                    event: NotificationEvent::from_parts(event_type, json!({})),
                })
                .await
                .unwrap()
        }

        /// Seeds an assignment and one `assignment_created` row for it.
        async fn queued_assignment(&self, email: Option<&str>, tokens: &[&str]) -> (Assignment, i64) {
            let now = Utc::now();
            let task = Task {
                id: Uuid::new_v4(),
                organization_id: Uuid::new_v4(),
                group_id: Uuid::new_v4(),
                title: "Stock count".to_string(),
                description: None,
                due_at: None,
                require_attachment: false,
                created_by: Uuid::new_v4(),
                created_at: now,
            };
            let assignment = Assignment::new(task.id, Uuid::new_v4(), now);
            self.store.add_profile(assignment.assignee_id, email, Some("Sam"));
            for token in tokens {
                self.store
                    .register_device_token(
                        &NewDeviceToken {
                            user_id: assignment.assignee_id,
                            token: token.to_string(),
                            platform: None,
                            device_name: None,
                        },
                        now,
                    )
                    .await
                    .unwrap();
            }
            let id = self
                .store
                .insert_notification(&NewNotification::for_assignment(
                    task.organization_id,
                    task.id,
                    assignment.id,
                    NotificationEvent::AssignmentCreated {
                        assignee_id: assignment.assignee_id,
                    },
                ))
                .await
                .unwrap();
            self.store.put_task(task);
            self.store.put_assignment(assignment.clone());
            (assignment, id)
        }

        fn processed(&self, id: i64) -> bool {
            self.store
                .notifications()
                .iter()
                .any(|row| row.id == id && row.processed_at.is_some())
        }
    }

    #[tokio::test]
    async fn resolved_rows_are_delivered_on_both_channels() {
        let h = harness();
        let (assignment, id) = h
            .queued_assignment(Some("sam@example.com"), &["ExponentPushToken[a]", "ExpoPushToken[b]"])
            .await;

        let summary = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(
            summary,
            DispatchSummary {
                fetched: 1,
                processed: 1,
                skipped: 0
            }
        );
        assert!(h.processed(id));

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sam@example.com");
        assert_eq!(sent[0].from, "tasks@example.com");
        assert_eq!(sent[0].subject, "New task: Stock count");

        let batches = h.push.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].sound, "default");
        assert_eq!(batches[0][0].data["assignment_id"], json!(assignment.id));
        assert_eq!(
            batches[0][0].data["url"],
            json!(format!("https://portal.example.com/tasks/{}", assignment.task_id))
        );
    }

    #[tokio::test]
    async fn email_failure_does_not_prevent_push() {
        let h = harness_with(RecordingMailer::failing(), RecordingPush::default());
        let (_, id) = h
            .queued_assignment(Some("sam@example.com"), &["ExponentPushToken[a]"])
            .await;

        h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(h.mailer.attempts(), 1);
        assert_eq!(h.push.batches().len(), 1);
        assert!(h.processed(id));
    }

    #[tokio::test]
    async fn push_failure_does_not_prevent_email() {
        let h = harness_with(RecordingMailer::default(), RecordingPush::failing());
        let (_, id) = h
            .queued_assignment(Some("sam@example.com"), &["ExponentPushToken[a]"])
            .await;

        h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(h.mailer.sent().len(), 1);
        assert!(h.processed(id));
    }

    #[tokio::test]
    async fn stalled_push_times_out_and_row_is_still_processed() {
        let h = harness_with(
            RecordingMailer::default(),
            RecordingPush::stalling(Duration::from_secs(30)),
        );
        let (_, id) = h
            .queued_assignment(None, &["ExponentPushToken[a]"])
            .await;

        let summary = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert!(h.processed(id));
    }

    #[tokio::test]
    async fn assignee_without_contact_details_gets_no_attempts() {
        let h = harness();
        let (_, id) = h.queued_assignment(None, &[]).await;

        let summary = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert!(h.processed(id));
        assert_eq!(h.mailer.attempts(), 0);
        assert!(h.push.batches().is_empty());
    }

    #[tokio::test]
    async fn malformed_tokens_are_filtered_out() {
        let h = harness();
        h.queued_assignment(None, &["ExponentPushToken[ok]", "legacy-gcm-token", ""])
            .await;

        h.worker.run(Utc::now()).await.unwrap();

        let batches = h.push.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].to, "ExponentPushToken[ok]");
    }

    #[tokio::test]
    async fn rows_without_a_live_assignment_stay_queued_and_unpolled() {
        let h = harness();
        let orphan = h
            .store
            .insert_notification(&NewNotification::for_assignment(
                Uuid::new_v4(),
                Uuid::new_v4(),
                Uuid::new_v4(),
                NotificationEvent::AssignmentCreated {
                    assignee_id: Uuid::new_v4(),
                },
            ))
            .await
            .unwrap();
        let detached = h.queue_detached("broadcast").await;
        let (_, good) = h.queued_assignment(None, &[]).await;

        let summary = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(
            summary,
            DispatchSummary {
                fetched: 1,
                processed: 1,
                skipped: 0
            }
        );
        assert!(!h.processed(orphan));
        assert!(!h.processed(detached));
        assert!(h.processed(good));
    }

    #[tokio::test]
    async fn backlog_of_detached_rows_does_not_starve_newer_work() {
        let h = harness();
        for _ in 0..60 {
            h.queue_detached("broadcast").await;
        }
        let (_, good) = h.queued_assignment(Some("sam@example.com"), &[]).await;

        let summary = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert!(h.processed(good));
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_mark_leaves_row_for_next_run() {
        let h = harness();
        let (_, id) = h.queued_assignment(Some("sam@example.com"), &[]).await;
        h.store.fail(FailPoint::MarkProcessed);

        let first = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(first.fetched, 1);
        assert_eq!(first.skipped, 1);
        assert!(!h.processed(id));

        h.store.heal(FailPoint::MarkProcessed);
        let second = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(second.processed, 1);
        assert!(h.processed(id));
        // at-least-once: the retry delivers again
        assert_eq!(h.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn context_failure_skips_row_but_not_batch() {
        let h = harness();
        h.queued_assignment(None, &[]).await;
        h.store.fail(FailPoint::FetchContext);

        let summary = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.skipped, 1);
        assert!(h.store.notifications().iter().all(|row| row.processed_at.is_none()));
    }

    #[tokio::test]
    async fn queue_read_failure_is_an_error() {
        let h = harness();
        h.store.fail(FailPoint::SelectUnprocessed);

        assert!(matches!(
            h.worker.run(Utc::now()).await,
            Err(DispatchError::Queue(_))
        ));
    }

    #[tokio::test]
    async fn second_run_finds_nothing_left() {
        let h = harness();
        h.queued_assignment(Some("sam@example.com"), &[]).await;

        h.worker.run(Utc::now()).await.unwrap();
        let second = h.worker.run(Utc::now()).await.unwrap();

        assert_eq!(second, DispatchSummary::default());
        assert_eq!(h.mailer.sent().len(), 1);
    }
}
