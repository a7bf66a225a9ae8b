//! SMTP delivery via lettre.

use crate::error::{MailError, Result};
use crate::templates::EmailTemplate;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sanare_core::config::MailConfig;
use sha2::{Digest, Sha256};

/// Send one email through the configured SMTP relay.
pub async fn send_smtp(email: &EmailTemplate, config: &MailConfig) -> Result<()> {
    let password = config
        .smtp_password
        .clone()
        .ok_or_else(|| MailError::Config("SMTP password is not set".to_string()))?;

    let from: Mailbox = config
        .from_address
        .parse()
        .map_err(|e| MailError::Config(format!("bad from address: {e}")))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| MailError::BadRecipient(format!("bad to address: {e}")))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(&email.subject)
        .body(email.body.clone())
        .map_err(|e| MailError::Build(e.to_string()))?;

    let credentials = Credentials::new(config.smtp_username.clone(), password);
    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        .map_err(|e| MailError::Transport(e.to_string()))?
        .port(config.smtp_port)
        .credentials(credentials)
        .build();

    transport
        .send(message)
        .await
        .map_err(|e| MailError::Transport(e.to_string()))?;

    // Log a digest of the body, never the body itself; it carries the code.
    tracing::info!(to = %email.to, body_sha256 = %body_hash(&email.body), "email sent");
    Ok(())
}

fn body_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_hash_is_deterministic() {
        assert_eq!(body_hash("hello"), body_hash("hello"));
        assert_ne!(body_hash("hello"), body_hash("world"));
    }

    #[tokio::test]
    async fn test_missing_password_is_config_error() {
        let config = MailConfig::default();
        let email = EmailTemplate {
            to: "ana@example.com".to_string(),
            subject: "x".to_string(),
            body: "y".to_string(),
        };
        let err = send_smtp(&email, &config).await.expect_err("must fail");
        assert!(matches!(err, MailError::Config(_)));
    }
}
