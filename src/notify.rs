//! Telegram notifier — posts a card to the support chat for every new ticket.
//!
//! Polls the store on a timer and keeps its own sent-ids ledger, separate
//! from the pipeline's processed-mail ledger. A failed send is retried on
//! the next cycle; the id is recorded only after Telegram accepts the
//! message.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::ChannelError;
use crate::ledger::IdLedger;
use crate::pipeline::types::{SentimentLabel, TicketRecord};
use crate::store::{TicketFilter, TicketStore};

/// How many recent tickets each cycle inspects.
const RECENT_WINDOW: usize = 50;
/// Longest summary slice that goes into a card.
const CARD_SUMMARY_CHARS: usize = 500;

/// Notifier settings, gated on `TELEGRAM_BOT_TOKEN` + `TELEGRAM_CHAT_ID`.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub chat_id: String,
    pub poll_interval_secs: u64,
    /// Sent-ids ledger file.
    pub sent_ids_path: PathBuf,
}

impl TelegramConfig {
    /// Build config from environment variables. Returns `None` unless both
    /// the bot token and the chat id are set (notifier disabled).
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        if bot_token.is_empty() || chat_id.is_empty() {
            return None;
        }

        Some(Self {
            bot_token: SecretString::from(bot_token),
            chat_id,
            poll_interval_secs: std::env::var("TELEGRAM_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            sent_ids_path: std::env::var("TELEGRAM_SENT_IDS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("sent_ids.json")),
        })
    }
}

/// Posts ticket cards via the Bot API.
pub struct TicketNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
    ledger: IdLedger,
}

impl TicketNotifier {
    pub fn new(config: TelegramConfig, ledger: IdLedger) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            ledger,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.config.bot_token.expose_secret()
        )
    }

    /// One poll cycle: list recent tickets, send a card per id the ledger
    /// has not seen, record each id once its card went through.
    pub async fn run_cycle(&mut self, store: &dyn TicketStore) {
        let filter = TicketFilter {
            limit: Some(RECENT_WINDOW),
            ..TicketFilter::default()
        };
        let records = match store.list(&filter).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "notifier could not list tickets");
                return;
            }
        };

        // Oldest first, so cards land in arrival order.
        for record in records.iter().rev() {
            if self.ledger.contains(&record.message_id) {
                continue;
            }

            match self.send_card(&format_card(record)).await {
                Ok(()) => {
                    if let Err(e) = self.ledger.record(&record.message_id) {
                        warn!(id = %record.message_id, error = %e, "sent-ids ledger write failed");
                    }
                    info!(id = %record.message_id, "Ticket card sent");
                }
                Err(e) => {
                    warn!(id = %record.message_id, error = %e, "Card send failed, retrying next cycle");
                }
            }
        }
    }

    /// Send one card, HTML parse mode first with a plain-text retry.
    async fn send_card(&self, text: &str) -> Result<(), ChannelError> {
        let html_body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML"
        });

        let html_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&html_body)
            .send()
            .await
            .map_err(send_err)?;

        if html_resp.status().is_success() {
            return Ok(());
        }

        let html_status = html_resp.status();
        warn!(
            status = ?html_status,
            "sendMessage with HTML failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(send_err)?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed (html: {html_status}, plain: {plain_err})"),
            });
        }

        Ok(())
    }
}

/// Spawn the notifier loop. Returns a `JoinHandle` and a shutdown flag.
pub fn spawn_notifier(
    mut notifier: TicketNotifier,
    store: Arc<dyn TicketStore>,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(
            interval_secs = notifier.config.poll_interval_secs,
            "Telegram notifier started"
        );

        let mut tick =
            tokio::time::interval(Duration::from_secs(notifier.config.poll_interval_secs));

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Telegram notifier shutting down");
                return;
            }

            notifier.run_cycle(store.as_ref()).await;
        }
    });

    (handle, shutdown_flag)
}

// ── Card formatting ─────────────────────────────────────────────────

fn sentiment_emoji(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Negative => "🔴",
        SentimentLabel::Neutral => "🟡",
        SentimentLabel::Positive => "🟢",
    }
}

/// Ticket card for the support chat.
pub fn format_card(record: &TicketRecord) -> String {
    let missing = "Не указано";
    let summary: String = record.description.chars().take(CARD_SUMMARY_CHARS).collect();

    format!(
        "{emoji} <b>Новое обращение #{id}</b>\n\n\
         👤 <b>ФИО:</b> {fio}\n\
         🏢 <b>Организация:</b> {org}\n\
         📞 <b>Телефон:</b> {phone}\n\
         📧 <b>Email:</b> {email}\n\n\
         📋 <b>Категория:</b> {category}\n\
         😊 <b>Тональность:</b> {sentiment} ({confidence:.0}%)\n\n\
         📝 <b>Суть вопроса:</b> {summary}\n\n\
         ⏰ <b>Дата получения:</b> {date}",
        emoji = sentiment_emoji(record.sentiment.label),
        id = record.message_id,
        fio = record.fio.as_deref().unwrap_or(missing),
        org = record.organization.as_deref().unwrap_or(missing),
        phone = record.phone.as_deref().unwrap_or(missing),
        email = record.email.as_deref().unwrap_or(missing),
        category = record.classification.category,
        sentiment = record.sentiment.label,
        confidence = record.sentiment.confidence * 100.0,
        summary = summary,
        date = record.date.format("%d.%m.%Y %H:%M"),
    )
}

fn send_err(e: reqwest::Error) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason: e.to_string(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
