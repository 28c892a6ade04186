//! Outbound transactional email.
//!
//! Uses SMTP via lettre when configured; otherwise messages are only logged.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use bazaar_core::Email;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// A message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Email,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl OutgoingEmail {
    /// The password reset message carrying `reset_url`.
    #[must_use]
    pub fn password_reset(to: Email, reset_url: &str) -> Self {
        Self {
            to,
            subject: "Reset your password".to_owned(),
            text_body: format!(
                "Someone asked to reset the password for this account.\n\n\
                 Open this link within 15 minutes to choose a new one:\n{reset_url}\n\n\
                 If it wasn't you, ignore this email."
            ),
            html_body: format!(
                "<p>Someone asked to reset the password for this account.</p>\
                 <p><a href=\"{reset_url}\">Choose a new password</a> \
                 (the link works for 15 minutes).</p>\
                 <p>If it wasn't you, ignore this email.</p>"
            ),
        }
    }
}

/// Something that delivers email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one message.
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// Email sender backed by an SMTP relay.
#[derive(Clone)]
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailSender {
    /// Create a new SMTP sender from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be set up.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.to_string()))?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body),
                    ),
            )?;

        self.mailer.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Sender used when SMTP is not configured: logs instead of delivering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, email not delivered"
        );
        tracing::debug!(body = %email.text_body, "Undelivered email body");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingEmailSender;

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::{EmailError, EmailSender, OutgoingEmail};

    /// Keeps every message instead of sending it.
    #[derive(Default)]
    pub struct RecordingEmailSender {
        sent: Mutex<Vec<OutgoingEmail>>,
        notify: Notify,
    }

    impl RecordingEmailSender {
        /// An empty outbox.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Messages recorded so far.
        #[must_use]
        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Wait until at least `count` messages were recorded.
        ///
        /// Sends run on spawned tasks, so callers should bound this with a
        /// timeout.
        pub async fn wait_for(&self, count: usize) -> Vec<OutgoingEmail> {
            loop {
                let notified = self.notify.notified();
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                notified.await;
            }
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmailSender {
        async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(email);
            self.notify.notify_waiters();
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_email_contains_link() {
        let to = Email::parse("lin@shop.test").unwrap();
        let email = OutgoingEmail::password_reset(to, "https://shop.test/reset-password/abc");

        assert!(email.text_body.contains("https://shop.test/reset-password/abc"));
        assert!(email.html_body.contains("href=\"https://shop.test/reset-password/abc\""));
        assert_eq!(email.to.as_str(), "lin@shop.test");
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let to = Email::parse("lin@shop.test").unwrap();
        assert!(
            LogEmailSender
                .send(OutgoingEmail::password_reset(to, "http://x.test/r/1"))
                .await
                .is_ok()
        );
    }
}
