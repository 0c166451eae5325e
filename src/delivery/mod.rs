//! Outbound channels used by the dispatch worker.

pub mod email;
pub mod push;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("push gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push gateway responded with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}
