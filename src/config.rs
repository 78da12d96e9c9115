//! Service configuration, built from environment variables.
//!
//! Subsystem configs (mail, LLM, Telegram) live next to their subsystems and
//! are gated on the presence of their own variables; `Settings` aggregates
//! them with the core pipeline knobs.

use std::path::PathBuf;

use crate::capability::LlmConfig;
use crate::mail::MailConfig;
use crate::notify::TelegramConfig;

/// Core service settings plus optional subsystem configs.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Mail channel; `None` disables the poll worker.
    pub mail: Option<MailConfig>,
    /// LLM backend; `None` runs the pipeline on fallbacks only.
    pub llm: Option<LlmConfig>,
    /// Telegram notifier; `None` disables notifications.
    pub telegram: Option<TelegramConfig>,
    /// Processed-message ledger file.
    pub processed_ids_path: PathBuf,
    /// libsql database path.
    pub db_path: String,
    pub api_host: String,
    pub api_port: u16,
    /// Character cap for model inputs (classifier and sentiment).
    pub max_input_chars: usize,
    /// Optional JSON knowledge base replacing the built-in content.
    pub kb_path: Option<PathBuf>,
    /// Directory for the rolling log file.
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mail: None,
            llm: None,
            telegram: None,
            processed_ids_path: PathBuf::from("processed_emails.json"),
            db_path: "supportdesk.db".to_string(),
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            max_input_chars: 512,
            kb_path: None,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /// Build settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            mail: MailConfig::from_env(),
            llm: LlmConfig::from_env(),
            telegram: TelegramConfig::from_env(),
            processed_ids_path: std::env::var("PROCESSED_IDS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_ids_path),
            db_path: std::env::var("DB_PATH").unwrap_or(defaults.db_path),
            api_host: std::env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.api_port),
            max_input_chars: std::env::var("MAX_INPUT_CHARS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_input_chars),
            kb_path: std::env::var("KB_PATH").ok().map(PathBuf::from),
            log_dir: std::env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        }
    }
}
