//! Outgoing mail
//!
//! Password reset links are mailed over SMTP when an `smtp` section is
//! configured. Without one the link is written to the log so a local
//! operator can still complete the flow.

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// How a message left the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No SMTP configured; the content went to the log
    Logged,
}

pub struct EmailService {
    smtp: Option<SmtpConfig>,
}

impl EmailService {
    pub fn new(smtp: Option<SmtpConfig>) -> Self {
        Self { smtp }
    }

    pub fn is_configured(&self) -> bool {
        self.smtp.is_some()
    }

    pub async fn send_password_reset(&self, to_email: &str, link: &str) -> Result<Delivery> {
        let body = format!(
            "Hello,\n\n\
             someone asked to reset the password of your Last Little Haven account.\n\
             Open the link below to choose a new password:\n\n{}\n\n\
             If this was not you, ignore this message.\n",
            link
        );

        let Some(smtp) = &self.smtp else {
            tracing::warn!(to = %to_email, %link, "SMTP not configured, password reset link logged");
            return Ok(Delivery::Logged);
        };

        self.send(smtp, to_email, "Reset your password", body).await?;
        tracing::info!(to = %to_email, "Password reset mail sent");
        Ok(Delivery::Sent)
    }

    async fn send(&self, smtp: &SmtpConfig, to_email: &str, subject: &str, body: String) -> Result<()> {
        let from = format!("{} <{}>", smtp.from_name, smtp.from);
        let email = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(smtp.port);
        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ));
        }

        builder
            .build()
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reset_link_is_logged_without_smtp() {
        let service = EmailService::new(None);
        assert!(!service.is_configured());

        let delivery = service
            .send_password_reset("a@example.org", "http://localhost:5173/reset-password?token=t")
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Logged);
    }
}
