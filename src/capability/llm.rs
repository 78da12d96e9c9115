//! rig-core backed capability implementations.
//!
//! Each capability gets its own agent with a fixed decoding profile:
//! classification-style calls run near-deterministic with a JSON-only
//! preamble, drafting runs the reply profile with no preamble (the generator
//! supplies the full prompt). Model answers are parsed defensively — JSON is
//! dug out of whatever wrapping the model added.

use std::sync::Arc;

use async_trait::async_trait;
use rig::agent::{Agent, AgentBuilder};
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, Prompt};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::capability::{
    DecodingParams, GenerativeModel, LabelPrediction, LlmBackend, LlmConfig, PolarityPrediction,
    SentimentModel, ZeroShotModel,
};
use crate::error::CapabilityError;

const SENTIMENT_PREAMBLE: &str = "Ты оцениваешь тональность обращения в техническую поддержку. \
Ответь только JSON вида {\"class\": N, \"confidence\": C}: N = 0 для негативной, 1 для нейтральной, \
2 для позитивной тональности; C — уверенность от 0 до 1. Никакого другого текста.";

const ZERO_SHOT_PREAMBLE: &str = "Ты — классификатор обращений в техническую поддержку. \
Выбери ровно одну категорию из предложенного списка. Ответь только JSON вида \
{\"label\": \"категория\", \"confidence\": C}, где C — уверенность от 0 до 1. \
Никакого другого текста.";

// ── Agent plumbing ──────────────────────────────────────────────────

/// One prompt in, one text answer out. Internal seam so the capability
/// impls stay provider-agnostic.
#[async_trait]
trait TextCompleter: Send + Sync {
    async fn complete(&self, input: &str) -> Result<String, CapabilityError>;
}

struct RigCompleter<M: CompletionModel> {
    agent: Agent<M>,
    capability: &'static str,
}

#[async_trait]
impl<M> TextCompleter for RigCompleter<M>
where
    M: CompletionModel + 'static,
{
    async fn complete(&self, input: &str) -> Result<String, CapabilityError> {
        self.agent
            .prompt(input)
            .await
            .map_err(|e| CapabilityError::prediction(self.capability, e.to_string()))
    }
}

fn build_completer(
    config: &LlmConfig,
    params: &DecodingParams,
    preamble: Option<&'static str>,
    capability: &'static str,
) -> Result<Arc<dyn TextCompleter>, CapabilityError> {
    match config.backend {
        LlmBackend::Anthropic => {
            use rig::providers::anthropic;

            let client: rig::client::Client<anthropic::client::AnthropicExt> =
                anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
                    CapabilityError::unavailable(
                        capability,
                        format!("Failed to create Anthropic client: {e}"),
                    )
                })?;
            Ok(finish_agent(
                client.agent(&config.model),
                params,
                preamble,
                capability,
            ))
        }
        LlmBackend::OpenAi => {
            use rig::providers::openai;

            let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
                openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
                    CapabilityError::unavailable(
                        capability,
                        format!("Failed to create OpenAI client: {e}"),
                    )
                })?;
            Ok(finish_agent(
                client.agent(&config.model),
                params,
                preamble,
                capability,
            ))
        }
    }
}

fn finish_agent<M>(
    builder: AgentBuilder<M>,
    params: &DecodingParams,
    preamble: Option<&'static str>,
    capability: &'static str,
) -> Arc<dyn TextCompleter>
where
    M: CompletionModel + 'static,
{
    let builder = match preamble {
        Some(p) => builder.preamble(p),
        None => builder,
    };
    let agent = builder
        .temperature(params.temperature)
        .max_tokens(params.max_tokens)
        .additional_params(serde_json::json!({ "top_p": params.top_p }))
        .build();
    Arc::new(RigCompleter { agent, capability })
}

// ── Capability impls ────────────────────────────────────────────────

struct LlmSentiment {
    completer: Arc<dyn TextCompleter>,
}

#[async_trait]
impl SentimentModel for LlmSentiment {
    async fn polarity(&self, text: &str) -> Result<PolarityPrediction, CapabilityError> {
        let raw = self.completer.complete(text).await?;
        parse_polarity(&raw)
    }
}

struct LlmZeroShot {
    completer: Arc<dyn TextCompleter>,
}

#[async_trait]
impl ZeroShotModel for LlmZeroShot {
    async fn classify(
        &self,
        text: &str,
        candidates: &[&str],
    ) -> Result<LabelPrediction, CapabilityError> {
        let request = format!(
            "Категории: {}\n\nТекст обращения:\n{}",
            candidates.join(", "),
            text
        );
        let raw = self.completer.complete(&request).await?;
        parse_label(&raw, candidates)
    }
}

struct LlmDrafter {
    completer: Arc<dyn TextCompleter>,
}

#[async_trait]
impl GenerativeModel for LlmDrafter {
    async fn draft(&self, prompt: &str) -> Result<String, CapabilityError> {
        self.completer.complete(prompt).await
    }
}

pub(crate) fn sentiment_agent(
    config: &LlmConfig,
) -> Result<Arc<dyn SentimentModel>, CapabilityError> {
    let completer = build_completer(
        config,
        &DecodingParams::deterministic(),
        Some(SENTIMENT_PREAMBLE),
        "sentiment",
    )?;
    tracing::info!(model = %config.model, "Sentiment capability ready");
    Ok(Arc::new(LlmSentiment { completer }))
}

pub(crate) fn zero_shot_agent(
    config: &LlmConfig,
) -> Result<Arc<dyn ZeroShotModel>, CapabilityError> {
    let completer = build_completer(
        config,
        &DecodingParams::deterministic(),
        Some(ZERO_SHOT_PREAMBLE),
        "zero-shot",
    )?;
    tracing::info!(model = %config.model, "Zero-shot capability ready");
    Ok(Arc::new(LlmZeroShot { completer }))
}

pub(crate) fn generative_agent(
    config: &LlmConfig,
) -> Result<Arc<dyn GenerativeModel>, CapabilityError> {
    let completer = build_completer(
        config,
        &DecodingParams::reply_drafting(),
        None,
        "generation",
    )?;
    tracing::info!(model = %config.model, "Generation capability ready");
    Ok(Arc::new(LlmDrafter { completer }))
}

// ── Answer parsing ──────────────────────────────────────────────────

fn default_confidence() -> f32 {
    0.5
}

fn parse_polarity(raw: &str) -> Result<PolarityPrediction, CapabilityError> {
    #[derive(Deserialize)]
    struct Out {
        class: usize,
        #[serde(default = "default_confidence")]
        confidence: f32,
    }

    let json = extract_json_object(raw);
    let out: Out = serde_json::from_str(&json).map_err(|e| {
        CapabilityError::prediction("sentiment", format!("unparseable model output: {e}"))
    })?;
    Ok(PolarityPrediction {
        ordinal: out.class,
        confidence: out.confidence.clamp(0.0, 1.0),
    })
}

fn parse_label(raw: &str, candidates: &[&str]) -> Result<LabelPrediction, CapabilityError> {
    #[derive(Deserialize)]
    struct Out {
        label: String,
        #[serde(default = "default_confidence")]
        confidence: f32,
    }

    let json = extract_json_object(raw);
    let out: Out = serde_json::from_str(&json).map_err(|e| {
        CapabilityError::prediction("zero-shot", format!("unparseable model output: {e}"))
    })?;

    let wanted = out.label.trim().to_lowercase();
    let canonical = candidates
        .iter()
        .find(|c| c.to_lowercase() == wanted)
        .ok_or_else(|| {
            CapabilityError::prediction(
                "zero-shot",
                format!("label '{}' outside candidate set", out.label),
            )
        })?;

    Ok(LabelPrediction {
        label: (*canonical).to_string(),
        confidence: out.confidence.clamp(0.0, 1.0),
    })
}

/// Dig a JSON object out of a model answer that may wrap it in prose or a
/// markdown code block.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_polarity_plain_json() {
        let p = parse_polarity(r#"{"class": 0, "confidence": 0.91}"#).unwrap();
        assert_eq!(p.ordinal, 0);
        assert!((p.confidence - 0.91).abs() < 1e-6);
    }

    #[test]
    fn parse_polarity_clamps_confidence() {
        let p = parse_polarity(r#"{"class": 2, "confidence": 1.7}"#).unwrap();
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn parse_polarity_missing_confidence_defaults() {
        let p = parse_polarity(r#"{"class": 1}"#).unwrap();
        assert_eq!(p.confidence, 0.5);
    }

    #[test]
    fn parse_polarity_rejects_prose() {
        let err = parse_polarity("затрудняюсь ответить").unwrap_err();
        assert!(err.to_string().contains("sentiment"));
    }

    #[test]
    fn parse_label_canonicalizes_case() {
        let candidates = ["документация", "калибровка"];
        let p = parse_label(
            r#"{"label": "Калибровка", "confidence": 0.8}"#,
            &candidates,
        )
        .unwrap();
        assert_eq!(p.label, "калибровка");
    }

    #[test]
    fn parse_label_rejects_unknown_label() {
        let candidates = ["документация", "калибровка"];
        let err = parse_label(r#"{"label": "жалоба"}"#, &candidates).unwrap_err();
        assert!(err.to_string().contains("outside candidate set"));
    }

    #[test]
    fn extract_json_from_code_block() {
        let raw = "Вот ответ:\n```json\n{\"class\": 1}\n```";
        assert_eq!(extract_json_object(raw), "{\"class\": 1}");
    }

    #[test]
    fn extract_json_from_surrounding_prose() {
        let raw = "Ответ: {\"label\": \"гарантия\", \"confidence\": 0.6} — готово";
        let json = extract_json_object(raw);
        assert!(json.starts_with('{') && json.ends_with('}'));
    }

    struct StaticCompleter(&'static str);

    #[async_trait]
    impl TextCompleter for StaticCompleter {
        async fn complete(&self, _input: &str) -> Result<String, CapabilityError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn sentiment_capability_parses_completer_output() {
        let cap = LlmSentiment {
            completer: Arc::new(StaticCompleter(r#"{"class": 2, "confidence": 0.77}"#)),
        };
        let p = cap.polarity("отличный сервис").await.unwrap();
        assert_eq!(p.ordinal, 2);
    }

    #[tokio::test]
    async fn zero_shot_capability_restricts_to_candidates() {
        let cap = LlmZeroShot {
            completer: Arc::new(StaticCompleter(r#"{"label": "неисправность"}"#)),
        };
        let p = cap
            .classify("прибор сломался", &["неисправность", "гарантия"])
            .await
            .unwrap();
        assert_eq!(p.label, "неисправность");
    }
}
