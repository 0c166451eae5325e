use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DeliveryError;

pub const EXPO_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

/// One entry of the push gateway's request array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Sends every message in a single request.
    async fn send(&self, messages: &[PushMessage]) -> Result<(), DeliveryError>;
}

/// Tokens look like `ExponentPushToken[xxxx]` (or the shorter `ExpoPushToken[...]`).
pub fn is_valid_push_token(token: &str) -> bool {
    ["ExponentPushToken[", "ExpoPushToken["].iter().any(|prefix| {
        token
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(']'))
            .is_some_and(|inner| !inner.is_empty() && !inner.contains(['[', ']']))
    })
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    #[serde(default)]
    data: Vec<Ticket>,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    status: String,
    message: Option<String>,
    details: Option<Value>,
}

pub struct ExpoPushClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoPushClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PushTransport for ExpoPushClient {
    async fn send(&self, messages: &[PushMessage]) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(messages)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // Tickets come back in request order.
        match response.json::<TicketResponse>().await {
            Ok(tickets) => {
                for (ticket, message) in tickets.data.iter().zip(messages) {
                    if ticket.status == "error" {
                        tracing::warn!(
                            token = %message.to,
                            message = ?ticket.message,
                            details = ?ticket.details,
                            "push ticket rejected"
                        );
                    }
                }
            }
            Err(e) => tracing::debug!(error = %e, "unreadable push ticket response"),
        }
        Ok(())
    }
}
