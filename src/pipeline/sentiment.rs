//! Sentiment scorer.
//!
//! Thin stage over the polarity capability. The capability is mandatory, so
//! there is no fallback path here; per-call failures propagate to the caller
//! and abort only that message.

use std::sync::Arc;

use crate::capability::SentimentModel;
use crate::error::CapabilityError;
use crate::pipeline::types::{SentimentLabel, SentimentResult};

pub struct SentimentScorer {
    model: Arc<dyn SentimentModel>,
    max_input_chars: usize,
}

impl SentimentScorer {
    pub fn new(model: Arc<dyn SentimentModel>, max_input_chars: usize) -> Self {
        Self {
            model,
            max_input_chars,
        }
    }

    pub async fn score(
        &self,
        subject: &str,
        body: &str,
    ) -> Result<SentimentResult, CapabilityError> {
        let input: String = format!("{subject} {body}")
            .chars()
            .take(self.max_input_chars)
            .collect();
        let prediction = self.model.polarity(&input).await?;

        Ok(SentimentResult {
            label: SentimentLabel::from_ordinal(prediction.ordinal),
            confidence: prediction.confidence,
        })
    }
}
