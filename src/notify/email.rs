//! SMTP email notifier.
//!
//! Sends the price alert with the proof screenshot attached.
//! Port 465 uses implicit TLS, any other port STARTTLS.
//! Default relay: smtp.gmail.com:465 (needs an app password).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tracing::{error, info};

use super::{Notifier, PriceAlert};
use crate::config::MailConfig;
use crate::errors::{Result, ScraperError};

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct EmailNotifier {
    sender: Mailbox,
    receiver: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    /// Build a notifier from the mail settings. Requires a complete config.
    pub fn from_config(cfg: &MailConfig) -> Result<Self> {
        let (Some(sender), Some(receiver), Some(password)) =
            (cfg.sender.as_deref(), cfg.receiver.as_deref(), cfg.password.as_ref())
        else {
            return Err(ScraperError::Config(
                "Email notification settings are not fully configured".into(),
            ));
        };

        let sender: Mailbox = sender
            .parse()
            .map_err(|e| ScraperError::Config(format!("Invalid sender address: {e}")))?;
        let receiver: Mailbox = receiver
            .parse()
            .map_err(|e| ScraperError::Config(format!("Invalid receiver address: {e}")))?;

        let credentials = Credentials::new(
            sender.email.to_string(),
            password.expose_secret().to_string(),
        );
        let builder = if cfg.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
        }
        .map_err(|e| ScraperError::Config(format!("Invalid SMTP relay {}: {e}", cfg.smtp_host)))?;

        let transport = builder
            .port(cfg.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            sender,
            receiver,
            transport,
        })
    }

    /// Compose the alert email with the screenshot attached.
    pub fn compose(&self, alert: &PriceAlert, image: Vec<u8>) -> Result<Message> {
        let png = ContentType::parse("image/png")
            .map_err(|e| ScraperError::Notify(e.to_string()))?;
        let attachment = Attachment::new(alert.attachment_name()).body(image, png);

        Message::builder()
            .from(self.sender.clone())
            .to(self.receiver.clone())
            .subject(alert.subject())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(alert.body()))
                    .singlepart(attachment),
            )
            .map_err(|e| ScraperError::Notify(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<()> {
        let image = tokio::fs::read(&alert.proof_path).await?;
        let message = self.compose(alert, image)?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(subject = %alert.subject(), "Email sent");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to send email");
                Err(ScraperError::Notify(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use secrecy::SecretString;
    use std::path::PathBuf;

    fn config() -> MailConfig {
        MailConfig {
            enabled: true,
            sender: Some("bot@example.com".into()),
            password: Some(SecretString::new("app-password".into())),
            receiver: Some("me@example.com".into()),
            ..MailConfig::default()
        }
    }

    #[test]
    fn test_incomplete_config_rejected() {
        let cfg = MailConfig {
            receiver: None,
            ..config()
        };
        assert!(matches!(
            EmailNotifier::from_config(&cfg),
            Err(ScraperError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let cfg = MailConfig {
            sender: Some("not an address".into()),
            ..config()
        };
        assert!(EmailNotifier::from_config(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_compose_includes_template_and_attachment() {
        let notifier = EmailNotifier::from_config(&config()).unwrap();
        let alert = PriceAlert {
            deck_title: "Krenko".into(),
            price: dec!(18.50),
            proof_path: PathBuf::from("unused.png"),
        };
        let message = notifier.compose(&alert, vec![0x89, b'P', b'N', b'G']).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains("Subject: Moxfield Scraper Success on Krenko!"));
        assert!(raw.contains("Krenko_proof.png"));
        assert!(raw.contains("image/png"));
    }
}
