//! Outgoing account mail.
//!
//! Delivery is an external concern; the core only needs the [`Mailer`]
//! trait. [`LogMailer`] writes the links to the log, [`MemoryMailer`] keeps
//! them for inspection.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::user::User;

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the email-confirmation link carrying a confirmation token.
    async fn send_confirmation_email(&self, user: &User, token: &str) -> Result<(), MailError>;

    /// Send the password-reset link carrying a reset token.
    async fn send_reset_password_email(&self, user: &User, token: &str)
    -> Result<(), MailError>;
}

/// Mailer that only logs the links it would send.
pub struct LogMailer {
    frontend_url: String,
}

impl LogMailer {
    pub fn new(frontend_url: &str) -> Self {
        Self {
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn confirmation_link(&self, token: &str) -> String {
        format!("{}/auth/confirm/{token}", self.frontend_url)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/auth/reset-password/{token}", self.frontend_url)
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation_email(&self, user: &User, token: &str) -> Result<(), MailError> {
        info!(user_id = user.id, "confirmation email queued");
        debug!(link = %self.confirmation_link(token), "confirmation link");
        Ok(())
    }

    async fn send_reset_password_email(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(), MailError> {
        info!(user_id = user.id, "reset password email queued");
        debug!(link = %self.reset_link(token), "reset password link");
        Ok(())
    }
}

/// Kind of mail sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Confirmation,
    ResetPassword,
}

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub kind: MailKind,
    pub to: String,
    pub token: String,
}

/// Mailer that records messages in memory. Can be switched to fail.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token of the most recent mail of `kind` sent to `to`.
    pub fn last_token(&self, kind: MailKind, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .map(|m| m.token)
    }

    fn record(&self, kind: MailKind, user: &User, token: &str) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError::Delivery("mailer configured to fail".into()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        sent.push(SentMail {
            kind,
            to: user.email.clone(),
            token: token.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_confirmation_email(&self, user: &User, token: &str) -> Result<(), MailError> {
        self.record(MailKind::Confirmation, user, token)
    }

    async fn send_reset_password_email(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(), MailError> {
        self.record(MailKind::ResetPassword, user, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_mailer_links_hang_off_frontend_url() {
        let mailer = LogMailer::new("https://app.example.com/");
        assert_eq!(
            mailer.confirmation_link("abc"),
            "https://app.example.com/auth/confirm/abc"
        );
        assert_eq!(
            mailer.reset_link("abc"),
            "https://app.example.com/auth/reset-password/abc"
        );
    }
}
