//! Per-message pipeline orchestration.
//!
//! Flow:
//! 1. Empty body → skip (`Ok(None)`, no ledger entry)
//! 2. Sentiment + classification run concurrently; summary and extraction
//!    are synchronous
//! 3. Merge into a draft, preferring extracted fields over header identity
//! 4. Generate the reply
//! 5. Record the message id in the dedup ledger (flushed before returning)

use tracing::{debug, info};

use crate::error::PipelineError;
use crate::ledger::IdLedger;
use crate::pipeline::classify::Classifier;
use crate::pipeline::extract::Extractor;
use crate::pipeline::sentiment::SentimentScorer;
use crate::pipeline::summarize::Summarizer;
use crate::pipeline::types::{
    ClassificationResult, ExtractionResult, RawMessage, SentimentResult, SummaryResult,
    TicketDraft, TicketRecord,
};
use crate::reply::ReplyGenerator;

pub struct TicketProcessor {
    extractor: Extractor,
    summarizer: Summarizer,
    classifier: Classifier,
    sentiment: SentimentScorer,
    generator: ReplyGenerator,
    ledger: IdLedger,
}

impl TicketProcessor {
    pub fn new(
        extractor: Extractor,
        summarizer: Summarizer,
        classifier: Classifier,
        sentiment: SentimentScorer,
        generator: ReplyGenerator,
        ledger: IdLedger,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            classifier,
            sentiment,
            generator,
            ledger,
        }
    }

    /// True when the id is already in the dedup ledger. Callers check this
    /// before `process` to skip redelivered messages.
    pub fn is_processed(&self, id: &str) -> bool {
        self.ledger.contains(id)
    }

    /// Run one message through the full pipeline.
    ///
    /// `Ok(None)` means the message had no usable body and was skipped
    /// without touching the ledger.
    pub async fn process(
        &mut self,
        raw: &RawMessage,
    ) -> Result<Option<TicketRecord>, PipelineError> {
        if raw.body.trim().is_empty() {
            info!(message_id = %raw.id, "message has no text body, skipping");
            return Ok(None);
        }

        info!(
            message_id = %raw.id,
            subject = %raw.subject,
            sender = %raw.sender_email,
            "processing message"
        );

        // Neither stage touches shared mutable state.
        let (sentiment, classification) = tokio::join!(
            self.sentiment.score(&raw.subject, &raw.body),
            self.classifier.classify(&raw.subject, &raw.body),
        );
        let sentiment = sentiment?;

        let summary = self.summarizer.summarize(&raw.body, &raw.subject);
        let extraction = self.extractor.extract(&raw.subject, &raw.body, &raw.sender_name);

        debug!(
            message_id = %raw.id,
            category = %classification.category,
            sentiment = sentiment.label.as_str(),
            summary_method = summary.method.as_str(),
            devices = extraction.devices.len(),
            "pipeline stages complete"
        );

        let draft = merge_draft(raw, &extraction, summary, sentiment, classification);
        let reply = self.generator.generate(&draft).await;
        let record = TicketRecord::assemble(draft, reply);

        // Flushed before the next message starts; a crash loses at most this
        // message's progress.
        self.ledger.record(&record.message_id)?;

        info!(
            message_id = %record.message_id,
            category = %record.classification.category,
            reply_method = record.reply.method.as_str(),
            "ticket assembled"
        );
        Ok(Some(record))
    }
}

/// Merge stage outputs into a draft. Extracted fields win over the header
/// identity; the header is only a fallback for name and email.
fn merge_draft(
    raw: &RawMessage,
    extraction: &ExtractionResult,
    summary: SummaryResult,
    sentiment: SentimentResult,
    classification: ClassificationResult,
) -> TicketDraft {
    let fallback_name = (!raw.sender_name.trim().is_empty()).then(|| raw.sender_name.clone());
    let fallback_email = (!raw.sender_email.trim().is_empty()).then(|| raw.sender_email.clone());

    TicketDraft {
        message_id: raw.id.clone(),
        date: raw.date,
        fio: extraction.fio.clone().or(fallback_name),
        organization: extraction.organization.clone(),
        phone: extraction.phones.first().cloned(),
        email: extraction.emails.first().cloned().or(fallback_email),
        serial_numbers: extraction.serial_numbers.clone(),
        device_type: extraction.first_device().map(str::to_string),
        description: summary.text,
        summary_method: summary.method,
        sentiment,
        classification,
    }
}
