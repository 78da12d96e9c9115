//! SMTP sender via lettre.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::error::ChannelError;
use crate::mail::{MailConfig, MailSender};

pub struct SmtpSender {
    config: MailConfig,
}

impl SmtpSender {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        send_blocking(&self.config, to, subject, body)
    }
}

fn send_blocking(
    config: &MailConfig,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<(), ChannelError> {
    let creds = Credentials::new(config.address.clone(), config.password.clone());

    let transport = SmtpTransport::relay(&config.smtp_host)
        .map_err(|e| send_err(format!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    let email = Message::builder()
        .from(
            config
                .address
                .parse()
                .map_err(|e| send_err(format!("invalid from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| send_err(format!("invalid to address: {e}")))?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| send_err(format!("failed to build email: {e}")))?;

    transport
        .send(&email)
        .map_err(|e| send_err(format!("SMTP send failed: {e}")))?;

    info!(to = %to, "reply sent");
    Ok(())
}

fn send_err(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "smtp".into(),
        reason,
    }
}
