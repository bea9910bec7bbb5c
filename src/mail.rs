//! Outbound mail behind an injectable seam.
//!
//! Handlers talk to a [`Mailer`] trait object held in [`AppState`], so tests
//! substitute a recording fake and a deployment without SMTP still runs.
//! Delivery is single-attempt; a transport failure surfaces as a 500 to the
//! caller.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;
use crate::error::AppError;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}

/// SMTP delivery via lettre (STARTTLS relay).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("mail.host is not configured"))?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let message = Message::builder()
            .from(self
                .from
                .parse()
                .map_err(|e| AppError::Mail(format!("bad from address: {e}")))?)
            .to(to
                .parse()
                .map_err(|e| AppError::Mail(format!("bad recipient address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Logs outbound mail instead of sending it. Used when SMTP is not
/// configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        tracing::info!(to, subject, "mail (log only): {}", html_body);
        Ok(())
    }
}
