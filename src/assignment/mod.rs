//! Assignment lifecycle: the status/review state machine and the service
//! that persists transitions and queues their notifications.

pub mod service;
pub mod state;

pub use service::{AssignmentError, AssignmentService};
pub use state::TransitionError;
