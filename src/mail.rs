//! Outbound mail for alerts

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use crate::util::split_smtp_address;

pub const ALERT_SUBJECT: &str = "Redis Alert";

/// Sends one HTML mail. Implementations must not retry.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, from: &str, to: &str, smtp_server: &str, html: &str) -> Result<()>;
}

/// Wrap a body fragment into a minimal HTML document
pub fn html_document(content: &str) -> String {
    format!("<html><body>{content}</body></html>")
}

/// Plain SMTP relay transport.
///
/// Connects without TLS or credentials, which is what internal relays
/// on port 25 expect.
#[derive(Debug, Clone, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn build_message(from: &str, to: &str, html: &str) -> Result<Message> {
        Message::builder()
            .from(from.parse::<Mailbox>().with_context(|| format!("invalid sender {from:?}"))?)
            .to(to.parse::<Mailbox>().with_context(|| format!("invalid recipient {to:?}"))?)
            .subject(ALERT_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(html_document(html))
            .context("failed to build alert mail")
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    #[instrument(skip(self, html))]
    async fn send(&self, from: &str, to: &str, smtp_server: &str, html: &str) -> Result<()> {
        let message = Self::build_message(from, to, html)?;
        let (host, port) = split_smtp_address(smtp_server);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();

        transport
            .send(message)
            .await
            .with_context(|| format!("failed to send alert mail via {host}:{port}"))?;

        debug!("alert mail sent to {to}");
        Ok(())
    }
}
