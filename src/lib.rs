//! Task assignment lifecycle and notification pipeline.
//!
//! Group admins publish tasks, assignees move their assignments through
//! `sent → received → completed`, reviewers accept or request changes. Every
//! transition queues a row in `notification_queue`; two externally triggered
//! workers turn deadlines into reminder rows and queue rows into email and
//! push deliveries.

pub mod api;
pub mod app_state;
pub mod assignment;
pub mod config;
pub mod db;
pub mod delivery;
pub mod logging;
pub mod middleware;
pub mod utils;
pub mod workers;
