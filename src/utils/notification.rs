use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::db::models::notification::NewNotification;
use crate::db::store::{NotificationQueue, Store};

/// Fire-and-forget writer for `notification_queue` rows.
///
/// [`NotificationEnqueuer::enqueue`] returns immediately; the insert runs on
/// a tracked background task. A failed insert is logged and counted, never
/// reported back to the caller: the domain change that produced the event
/// has already been committed.
#[derive(Clone)]
pub struct NotificationEnqueuer {
    store: Arc<dyn Store>,
    tracker: TaskTracker,
    failures: Arc<AtomicU64>,
}

impl NotificationEnqueuer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            tracker: TaskTracker::new(),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn enqueue(&self, notification: NewNotification) {
        let store = Arc::clone(&self.store);
        let failures = Arc::clone(&self.failures);

        self.tracker.spawn(async move {
            let event_type = notification.event.event_type().to_string();
            match store.insert_notification(&notification).await {
                Ok(id) => tracing::debug!(
                    notification_id = id,
                    event_type = %event_type,
                    assignment_id = ?notification.assignment_id,
                    "notification queued"
                ),
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        event_type = %event_type,
                        assignment_id = ?notification.assignment_id,
                        task_id = ?notification.task_id,
                        error = %e,
                        "failed to queue notification"
                    );
                }
            }
        });
    }

    /// Waits for every enqueue started so far. Used on shutdown and in tests.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Number of inserts that have failed since start-up.
    pub fn failed_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}
