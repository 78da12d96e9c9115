//! Model capabilities behind object-safe seams.
//!
//! The pipeline stages talk to three narrow traits — ordinal polarity,
//! zero-shot label choice, free-text drafting — and never to a provider
//! directly. Production impls ride on rig-core agents (`llm` submodule);
//! tests substitute mocks.

pub mod llm;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::CapabilityError;

/// Ordinal polarity prediction: class index plus confidence.
///
/// The index is positional, not named; mapping indices to labels is the
/// sentiment scorer's job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarityPrediction {
    pub ordinal: usize,
    pub confidence: f32,
}

#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn polarity(&self, text: &str) -> Result<PolarityPrediction, CapabilityError>;
}

/// Zero-shot label prediction restricted to a candidate set.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPrediction {
    pub label: String,
    pub confidence: f32,
}

#[async_trait]
pub trait ZeroShotModel: Send + Sync {
    /// Pick one of `candidates` for the text. The returned label is always a
    /// member of the candidate set.
    async fn classify(
        &self,
        text: &str,
        candidates: &[&str],
    ) -> Result<LabelPrediction, CapabilityError>;
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn draft(&self, prompt: &str) -> Result<String, CapabilityError>;
}

/// Fixed decoding profile for a capability agent.
///
/// `repetition_penalty` is part of the profile; backends without a native
/// repeat-suppression knob rely on the reply sanitizer's duplicate-line pass
/// instead.
#[derive(Debug, Clone)]
pub struct DecodingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u64,
    pub repetition_penalty: f64,
}

impl DecodingParams {
    /// Near-deterministic profile for classification-style calls.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 128,
            repetition_penalty: 1.0,
        }
    }

    /// Profile for reply drafting: low temperature, bounded length,
    /// aggressive repeat suppression.
    pub fn reply_drafting() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            max_tokens: 400,
            repetition_penalty: 1.25,
        }
    }
}

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating capability agents.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
}

impl LlmConfig {
    /// Build config from environment variables.
    /// Returns `None` when no API key is configured (capabilities disabled).
    pub fn from_env() -> Option<Self> {
        let backend = match std::env::var("LLM_BACKEND").ok().as_deref() {
            Some("openai") => LlmBackend::OpenAi,
            _ => LlmBackend::Anthropic,
        };

        let key_var = match backend {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        };
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var(key_var))
            .ok()?;

        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| {
            match backend {
                LlmBackend::Anthropic => "claude-3-5-haiku-latest",
                LlmBackend::OpenAi => "gpt-4o-mini",
            }
            .to_string()
        });

        Some(Self {
            backend,
            api_key: SecretString::from(api_key),
            model,
        })
    }
}

/// Create the sentiment capability. Mandatory at wiring time: a `None`
/// config or construction failure is a `ModelUnavailable` error.
pub fn create_sentiment(
    config: Option<&LlmConfig>,
) -> Result<Arc<dyn SentimentModel>, CapabilityError> {
    let config = config.ok_or_else(|| {
        CapabilityError::unavailable("sentiment", "no LLM backend configured")
    })?;
    llm::sentiment_agent(config)
}

/// Create the zero-shot classification capability.
pub fn create_zero_shot(config: &LlmConfig) -> Result<Arc<dyn ZeroShotModel>, CapabilityError> {
    llm::zero_shot_agent(config)
}

/// Create the reply-drafting capability.
pub fn create_generative(config: &LlmConfig) -> Result<Arc<dyn GenerativeModel>, CapabilityError> {
    llm::generative_agent(config)
}
