//! Shared types flowing through the ticket pipeline.
//!
//! Every stage emits a strongly-typed record; label enums serialize to the
//! exact lowercase strings the store, API and notifier expose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound support message as fetched from the mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Mailbox-unique message identifier.
    pub id: String,
    pub date: DateTime<Utc>,
    /// Sender display name; empty when the header carries none.
    pub sender_name: String,
    pub sender_email: String,
    pub subject: String,
    pub body: String,
}

// ── Extraction ──────────────────────────────────────────────────────

/// How a device model was found in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMatchMethod {
    Exact,
    Synonym,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceMatch {
    pub model: String,
    /// Catalog category; `other` for unmapped models.
    pub category: String,
    pub method: DeviceMatchMethod,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub devices: Vec<DeviceMatch>,
    pub serial_numbers: Vec<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub fio: Option<String>,
    pub organization: Option<String>,
}

impl ExtractionResult {
    pub fn first_device(&self) -> Option<&str> {
        self.devices.first().map(|d| d.model.as_str())
    }
}

// ── Sentiment ───────────────────────────────────────────────────────

/// Three-way sentiment label. The mapping from a capability's class index
/// is positional, never by label text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    /// Ordinal position → label; out-of-range indices are neutral.
    pub fn from_ordinal(ordinal: usize) -> Self {
        match ordinal {
            0 => Self::Negative,
            1 => Self::Neutral,
            2 => Self::Positive,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            "positive" => Some(Self::Positive),
            _ => None,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub confidence: f32,
}

// ── Classification ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifyMethod {
    Keywords,
    Model,
    Fallback,
}

impl ClassifyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keywords => "keywords",
            Self::Model => "model",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ClassifyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub confidence: f32,
    pub method: ClassifyMethod,
}

// ── Summary ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMethod {
    Subject,
    Keywords,
    Sentences,
    Fallback,
    Empty,
}

impl SummaryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Keywords => "keywords",
            Self::Sentences => "sentences",
            Self::Fallback => "fallback",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for SummaryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub text: String,
    pub method: SummaryMethod,
}

// ── Reply ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMethod {
    Llm,
    FallbackDocs,
    Fallback,
}

impl ReplyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::FallbackDocs => "fallback_docs",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ReplyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReply {
    pub subject: String,
    pub body: String,
    pub method: ReplyMethod,
}

// ── Ticket ──────────────────────────────────────────────────────────

/// Merged analysis results for one message, before reply generation.
/// Extracted identity fields win over header-derived ones; the header is
/// the fallback.
#[derive(Debug, Clone)]
pub struct TicketDraft {
    pub message_id: String,
    pub date: DateTime<Utc>,
    pub fio: Option<String>,
    pub organization: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub serial_numbers: Vec<String>,
    pub device_type: Option<String>,
    pub description: String,
    pub summary_method: SummaryMethod,
    pub sentiment: SentimentResult,
    pub classification: ClassificationResult,
}

/// The completed, persisted ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    pub message_id: String,
    pub date: DateTime<Utc>,
    pub fio: Option<String>,
    pub organization: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub serial_numbers: Vec<String>,
    pub device_type: Option<String>,
    pub description: String,
    pub summary_method: SummaryMethod,
    pub sentiment: SentimentResult,
    pub classification: ClassificationResult,
    pub reply: GeneratedReply,
    pub processed_at: DateTime<Utc>,
    /// Owned by downstream consumers; the pipeline never sets it.
    #[serde(default)]
    pub answered: bool,
}

impl TicketRecord {
    pub fn assemble(draft: TicketDraft, reply: GeneratedReply) -> Self {
        Self {
            message_id: draft.message_id,
            date: draft.date,
            fio: draft.fio,
            organization: draft.organization,
            phone: draft.phone,
            email: draft.email,
            serial_numbers: draft.serial_numbers,
            device_type: draft.device_type,
            description: draft.description,
            summary_method: draft.summary_method,
            sentiment: draft.sentiment,
            classification: draft.classification,
            reply,
            processed_at: Utc::now(),
            answered: false,
        }
    }
}
