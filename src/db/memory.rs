//! In-process store backing the unit and router tests.
//!
//! Mirrors the filtering and guard semantics of the SQL in `db::queries`.
//! Individual operations can be made to fail with [`FailPoint`] to exercise
//! best-effort paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::db::models::assignment::{
    Assignment, AssignmentStatus, ReminderCandidate, ReminderKind, ReviewStatus,
};
use crate::db::models::device_token::{DeviceToken, NewDeviceToken};
use crate::db::models::notification::{AssignmentContext, NewNotification, NotificationQueueEntry};
use crate::db::models::task::Task;
use crate::db::store::{
    AssignmentRepository, DeviceTokenRegistry, NotificationQueue, StoreError, StoreResult,
};

/// Store operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertNotification,
    SelectUnprocessed,
    MarkProcessed,
    SelectDueSoon,
    SelectOverdue,
    UpdateReminderMarker,
    FetchContext,
    ListDeviceTokens,
    UpdateAssignment,
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    failures: Arc<RwLock<HashSet<FailPoint>>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: HashMap<Uuid, Task>,
    assignments: HashMap<Uuid, Assignment>,
    profiles: HashMap<Uuid, Profile>,
    // (group_id, user_id) -> tags
    member_tags: HashMap<(Uuid, Uuid), HashSet<Uuid>>,
    notifications: BTreeMap<i64, NotificationQueueEntry>,
    next_notification_id: i64,
    device_tokens: HashMap<(Uuid, String), DeviceToken>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, point: FailPoint) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(point);
        }
    }

    pub fn heal(&self, point: FailPoint) {
        if let Ok(mut failures) = self.failures.write() {
            failures.remove(&point);
        }
    }

    pub fn add_profile(&self, user_id: Uuid, email: Option<&str>, display_name: Option<&str>) {
        if let Ok(mut state) = self.state.write() {
            state.profiles.insert(
                user_id,
                Profile {
                    email: email.map(str::to_string),
                    display_name: display_name.map(str::to_string),
                },
            );
        }
    }

    pub fn add_member(&self, group_id: Uuid, user_id: Uuid, tags: &[Uuid]) {
        if let Ok(mut state) = self.state.write() {
            state
                .member_tags
                .entry((group_id, user_id))
                .or_default()
                .extend(tags.iter().copied());
        }
    }

    /// Snapshot of every queue row, oldest first.
    pub fn notifications(&self) -> Vec<NotificationQueueEntry> {
        self.state
            .read()
            .map(|state| state.notifications.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn assignment(&self, id: Uuid) -> Option<Assignment> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.assignments.get(&id).cloned())
    }

    /// Overwrites an assignment as-is, bypassing the state machine.
    pub fn put_assignment(&self, assignment: Assignment) {
        if let Ok(mut state) = self.state.write() {
            state.assignments.insert(assignment.id, assignment);
        }
    }

    pub fn put_task(&self, task: Task) {
        if let Ok(mut state) = self.state.write() {
            state.tasks.insert(task.id, task);
        }
    }

    fn check(&self, point: FailPoint) -> StoreResult<()> {
        let failing = self
            .failures
            .read()
            .map(|failures| failures.contains(&point))
            .unwrap_or(false);
        if failing {
            return Err(StoreError::Unavailable(format!("{point:?} failure injected")));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

impl MemoryState {
    fn open_candidates<F>(&self, keep: F) -> Vec<ReminderCandidate>
    where
        F: Fn(&Assignment, DateTime<Utc>) -> bool,
    {
        let mut candidates: Vec<ReminderCandidate> = self
            .assignments
            .values()
            .filter(|a| !matches!(a.status, AssignmentStatus::Completed | AssignmentStatus::Archived))
            .filter(|a| a.review_status != ReviewStatus::Accepted)
            .filter_map(|a| {
                let task = self.tasks.get(&a.task_id)?;
                let due_at = task.due_at?;
                keep(a, due_at).then(|| ReminderCandidate {
                    assignment_id: a.id,
                    task_id: a.task_id,
                    organization_id: task.organization_id,
                    assignee_id: a.assignee_id,
                    due_at,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.due_at
                .cmp(&b.due_at)
                .then(a.assignment_id.cmp(&b.assignment_id))
        });
        candidates
    }

    fn push_notification(&mut self, notification: &NewNotification) -> i64 {
        self.next_notification_id += 1;
        let id = self.next_notification_id;
        self.notifications.insert(
            id,
            NotificationQueueEntry {
                id,
                organization_id: notification.organization_id,
                task_id: notification.task_id,
                assignment_id: notification.assignment_id,
                event: notification.event.clone(),
                created_at: Utc::now(),
                processed_at: None,
            },
        );
        id
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    async fn insert_task(&self, task: &Task, assignments: &[Assignment]) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::Unavailable(format!("duplicate task {}", task.id)));
        }
        state.tasks.insert(task.id, task.clone());
        for assignment in assignments {
            state.assignments.insert(assignment.id, assignment.clone());
        }
        Ok(())
    }

    async fn fetch_task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.read()?.tasks.get(&task_id).cloned())
    }

    async fn members_with_tags(&self, group_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let state = self.read()?;
        let mut members: Vec<Uuid> = state
            .member_tags
            .iter()
            .filter(|((group, _), tags)| *group == group_id && tag_ids.iter().any(|t| tags.contains(t)))
            .map(|((_, user), _)| *user)
            .collect();
        members.sort();
        Ok(members)
    }

    async fn fetch_assignment(&self, assignment_id: Uuid) -> StoreResult<Option<Assignment>> {
        Ok(self.read()?.assignments.get(&assignment_id).cloned())
    }

    async fn update_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        self.check(FailPoint::UpdateAssignment)?;
        let mut state = self.write()?;
        let stored = state
            .assignments
            .get_mut(&assignment.id)
            .ok_or_else(|| StoreError::NotFound(format!("assignment {}", assignment.id)))?;

        let (due_marker, overdue_marker) = if assignment.status == AssignmentStatus::Sent {
            (None, None)
        } else {
            (stored.due_reminder_sent_at, stored.overdue_reminder_sent_at)
        };
        *stored = Assignment {
            due_reminder_sent_at: due_marker,
            overdue_reminder_sent_at: overdue_marker,
            ..assignment.clone()
        };
        Ok(())
    }

    async fn reschedule_task(
        &self,
        task_id: Uuid,
        due_at: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        let mut state = self.write()?;
        let task = state
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;
        task.due_at = due_at;

        let mut reset = 0;
        for assignment in state.assignments.values_mut().filter(|a| a.task_id == task_id) {
            assignment.due_reminder_sent_at = None;
            assignment.overdue_reminder_sent_at = None;
            reset += 1;
        }
        Ok(reset)
    }

    async fn select_due_soon_assignments(
        &self,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>> {
        self.check(FailPoint::SelectDueSoon)?;
        let state = self.read()?;
        Ok(state.open_candidates(|a, due_at| {
            a.due_reminder_sent_at.is_none() && due_at >= now && due_at <= horizon
        }))
    }

    async fn select_overdue_assignments(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>> {
        self.check(FailPoint::SelectOverdue)?;
        let state = self.read()?;
        Ok(state.open_candidates(|a, due_at| a.overdue_reminder_sent_at.is_none() && due_at < now))
    }

    async fn update_reminder_marker(
        &self,
        assignment_ids: &[Uuid],
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.check(FailPoint::UpdateReminderMarker)?;
        let mut state = self.write()?;
        let mut updated = 0;
        for id in assignment_ids {
            let Some(assignment) = state.assignments.get_mut(id) else {
                continue;
            };
            let marker = match kind {
                ReminderKind::DueSoon => &mut assignment.due_reminder_sent_at,
                ReminderKind::Overdue => &mut assignment.overdue_reminder_sent_at,
            };
            if marker.is_none() {
                *marker = Some(at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn fetch_assignment_context(
        &self,
        assignment_id: Uuid,
    ) -> StoreResult<Option<AssignmentContext>> {
        self.check(FailPoint::FetchContext)?;
        let state = self.read()?;
        let Some(assignment) = state.assignments.get(&assignment_id) else {
            return Ok(None);
        };
        let Some(task) = state.tasks.get(&assignment.task_id) else {
            return Ok(None);
        };
        let profile = state
            .profiles
            .get(&assignment.assignee_id)
            .cloned()
            .unwrap_or_default();

        Ok(Some(AssignmentContext {
            assignment_id: assignment.id,
            task_id: task.id,
            organization_id: task.organization_id,
            assignee_id: assignment.assignee_id,
            status: assignment.status,
            review_status: assignment.review_status,
            review_note: assignment.review_note.clone(),
            task_title: task.title.clone(),
            task_due_at: task.due_at,
            assignee_email: profile.email,
            assignee_name: profile.display_name,
        }))
    }
}

#[async_trait]
impl NotificationQueue for InMemoryStore {
    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<i64> {
        self.check(FailPoint::InsertNotification)?;
        Ok(self.write()?.push_notification(notification))
    }

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> StoreResult<Vec<i64>> {
        self.check(FailPoint::InsertNotification)?;
        let mut state = self.write()?;
        Ok(notifications
            .iter()
            .map(|notification| state.push_notification(notification))
            .collect())
    }

    async fn select_unprocessed_notifications(
        &self,
        limit: i64,
    ) -> StoreResult<Vec<NotificationQueueEntry>> {
        self.check(FailPoint::SelectUnprocessed)?;
        let state = self.read()?;
        let mut rows: Vec<NotificationQueueEntry> = state
            .notifications
            .values()
            .filter(|entry| entry.processed_at.is_none())
            .filter(|entry| {
                entry
                    .assignment_id
                    .is_some_and(|id| state.assignments.contains_key(&id))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn mark_notification_processed(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        self.check(FailPoint::MarkProcessed)?;
        let mut state = self.write()?;
        match state.notifications.get_mut(&id) {
            Some(entry) if entry.processed_at.is_none() => {
                entry.processed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl DeviceTokenRegistry for InMemoryStore {
    async fn register_device_token(
        &self,
        token: &NewDeviceToken,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<DeviceToken> {
        let mut state = self.write()?;
        let registered = DeviceToken {
            user_id: token.user_id,
            token: token.token.clone(),
            platform: token.platform.clone(),
            device_name: token.device_name.clone(),
            last_seen_at: seen_at,
        };
        state
            .device_tokens
            .insert((token.user_id, token.token.clone()), registered.clone());
        Ok(registered)
    }

    async fn list_device_tokens(&self, user_id: Uuid) -> StoreResult<Vec<DeviceToken>> {
        self.check(FailPoint::ListDeviceTokens)?;
        let state = self.read()?;
        let mut tokens: Vec<DeviceToken> = state
            .device_tokens
            .values()
            .filter(|token| token.user_id == user_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(user_id: Uuid, value: &str) -> NewDeviceToken {
        NewDeviceToken {
            user_id,
            token: value.to_string(),
            platform: Some("ios".to_string()),
            device_name: None,
        }
    }

    #[tokio::test]
    async fn registering_the_same_token_twice_refreshes_last_seen() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let first_seen = Utc::now() - Duration::days(3);
        let now = Utc::now();

        store
            .register_device_token(&token(user_id, "ExponentPushToken[a]"), first_seen)
            .await
            .unwrap();
        store
            .register_device_token(&token(user_id, "ExponentPushToken[a]"), now)
            .await
            .unwrap();

        let tokens = store.list_device_tokens(user_id).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].last_seen_at, now);
    }

    #[tokio::test]
    async fn tokens_are_listed_most_recent_first() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        store
            .register_device_token(&token(user_id, "old"), now - Duration::hours(5))
            .await
            .unwrap();
        store
            .register_device_token(&token(user_id, "new"), now)
            .await
            .unwrap();
        store
            .register_device_token(&token(Uuid::new_v4(), "someone-else"), now)
            .await
            .unwrap();

        let tokens: Vec<String> = store
            .list_device_tokens(user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(tokens, vec!["new".to_string(), "old".to_string()]);
    }

    #[tokio::test]
    async fn processed_at_is_only_set_once() {
        let store = InMemoryStore::new();
        let id = store
            .insert_notification(&NewNotification {
                organization_id: None,
                task_id: None,
                assignment_id: None,
                event: crate::db::models::notification::NotificationEvent::from_parts(
                    "ping",
                    serde_json::json!({}),
                ),
            })
            .await
            .unwrap();
        let first = Utc::now();

        assert!(store.mark_notification_processed(id, first).await.unwrap());
        assert!(!store
            .mark_notification_processed(id, first + Duration::minutes(1))
            .await
            .unwrap());
        assert_eq!(store.notifications()[0].processed_at, Some(first));
        assert!(store.select_unprocessed_notifications(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fail_points_can_be_healed() {
        let store = InMemoryStore::new();
        store.fail(FailPoint::SelectUnprocessed);
        assert!(store.select_unprocessed_notifications(10).await.is_err());

        store.heal(FailPoint::SelectUnprocessed);
        assert!(store.select_unprocessed_notifications(10).await.is_ok());
    }
}
