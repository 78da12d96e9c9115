//! Mail channel: IMAP polling for inbound, SMTP via lettre for outbound.
//!
//! The worker talks to the mailbox through the `MailSource`/`MailSender`
//! seams; production implementations live in `imap` and `smtp`, tests plug
//! in mocks.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::pipeline::types::RawMessage;

mod imap;
mod smtp;

pub use imap::ImapSource;
pub use smtp::SmtpSender;

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Login and `From` address.
    pub address: String,
    pub password: String,
    pub folder: String,
    pub poll_interval_secs: u64,
    /// Unseen messages fetched per poll cycle.
    pub batch_limit: usize,
}

impl MailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_IMAP_HOST` is not set (mail disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("EMAIL_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("EMAIL_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let address = std::env::var("EMAIL_ADDRESS").unwrap_or_default();
        let password = std::env::var("EMAIL_PASSWORD").unwrap_or_default();
        let folder = std::env::var("EMAIL_FOLDER").unwrap_or_else(|_| "INBOX".to_string());

        let poll_interval_secs: u64 = std::env::var("EMAIL_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let batch_limit: usize = std::env::var("EMAIL_BATCH_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            address,
            password,
            folder,
            poll_interval_secs,
            batch_limit,
        })
    }
}

// ── Seams ───────────────────────────────────────────────────────────

/// Inbound mailbox access. `fetch_unseen` never flips flags; a message
/// becomes seen only through an explicit `mark_seen`, so a crashed run
/// re-fetches whatever it did not finish.
#[async_trait]
pub trait MailSource: Send + Sync {
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<RawMessage>, ChannelError>;
    async fn mark_seen(&self, id: &str) -> Result<(), ChannelError>;
}

/// Outbound mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError>;
}
