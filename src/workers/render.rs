//! Message text for queued events.

use serde_json::{json, Value};
use std::fmt::Write;

use crate::db::models::notification::{AssignmentContext, NotificationEvent};

/// Email and push copy for one queue row.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNotification {
    pub subject: String,
    pub body: String,
    pub push_title: String,
    pub push_body: String,
    pub data: Value,
}

fn headline(event: &NotificationEvent) -> &'static str {
    match event {
        NotificationEvent::AssignmentCreated { .. } => "New task",
        NotificationEvent::StatusChanged { .. } => "Task updated",
        NotificationEvent::ReviewUpdated { .. } => "Review updated",
        NotificationEvent::DueReminder { .. } => "Due soon",
        NotificationEvent::OverdueReminder { .. } => "Overdue",
        NotificationEvent::Other { .. } => "Notification",
    }
}

pub fn event_line(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::AssignmentCreated { .. } => {
            "You have been assigned to this task".to_string()
        }
        NotificationEvent::StatusChanged { new_status, .. } => {
            format!("Task status is now: {}", new_status.label())
        }
        NotificationEvent::ReviewUpdated {
            new_review_status, ..
        } => format!("Review status is now: {}", new_review_status.label()),
        NotificationEvent::DueReminder { .. } => {
            "The deadline for this task is approaching".to_string()
        }
        NotificationEvent::OverdueReminder { .. } => "This task is past its due date".to_string(),
        NotificationEvent::Other { event_type, .. } => format!("Event: {event_type}"),
    }
}

pub fn deep_link(portal_base_url: Option<&str>, context: &AssignmentContext) -> Option<String> {
    portal_base_url.map(|base| format!("{}/tasks/{}", base.trim_end_matches('/'), context.task_id))
}

pub fn render(
    event: &NotificationEvent,
    context: &AssignmentContext,
    portal_base_url: Option<&str>,
) -> RenderedNotification {
    let line = event_line(event);
    let link = deep_link(portal_base_url, context);

    let mut body = match context.assignee_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("Hi {name},\n\n"),
        _ => "Hi,\n\n".to_string(),
    };
    let _ = writeln!(body, "{line}\n");
    let _ = writeln!(body, "Task: {}", context.task_title);
    if let Some(due_at) = context.task_due_at {
        let _ = writeln!(body, "Due: {}", due_at.format("%Y-%m-%d %H:%M UTC"));
    }
    if matches!(event, NotificationEvent::ReviewUpdated { .. }) {
        if let Some(note) = context.review_note.as_deref().filter(|n| !n.trim().is_empty()) {
            let _ = writeln!(body, "Review note: {note}");
        }
    }
    if let Some(url) = &link {
        let _ = write!(body, "\nOpen: {url}\n");
    }

    let mut data = json!({
        "assignment_id": context.assignment_id,
        "task_id": context.task_id,
        "event_type": event.event_type(),
    });
    if let Some(url) = link {
        data["url"] = Value::String(url);
    }

    RenderedNotification {
        subject: format!("{}: {}", headline(event), context.task_title),
        body,
        push_title: context.task_title.clone(),
        push_body: line,
        data,
    }
}
