use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use super::DeliveryError;
use crate::config::SmtpSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError>;
}

/// Plain-text mail over an authenticated STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, DeliveryError> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|e: lettre::address::AddressError| DeliveryError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(mailbox(&email.from)?)
            .to(mailbox(&email.to)?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.content.clone())
            .map_err(|e| DeliveryError::Message(e.to_string()))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// A transport plus the sender address every message goes out from.
#[derive(Clone)]
pub struct EmailChannel {
    transport: Arc<dyn EmailTransport>,
    from: String,
}

impl EmailChannel {
    pub fn new(transport: Arc<dyn EmailTransport>, from: impl Into<String>) -> Self {
        Self {
            transport,
            from: from.into(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, content: &str) -> Result<(), DeliveryError> {
        self.transport
            .send(&OutgoingEmail {
                from: self.from.clone(),
                to: to.to_string(),
                subject: subject.to_string(),
                content: content.to_string(),
            })
            .await
    }
}
