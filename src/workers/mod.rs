//! Externally triggered batch jobs over the notification queue.

pub mod dispatch;
pub mod reminder;
pub mod render;

pub use dispatch::{DispatchError, DispatchSummary, DispatchWorker};
pub use reminder::{ReminderScheduler, ReminderSummary};
