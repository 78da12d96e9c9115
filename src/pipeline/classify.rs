//! Hybrid category classifier.
//!
//! Keyword scoring runs first and short-circuits the model on a confident
//! hit. Otherwise a zero-shot capability breaks the tie, and its result is
//! taken only when strictly better than the keyword score. Classification
//! never fails; the worst case is the `другое` fallback triple.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::capability::ZeroShotModel;
use crate::pipeline::types::{ClassificationResult, ClassifyMethod};

const SHORT_CIRCUIT_SCORE: f32 = 0.5;
const MODEL_INPUT_CHARS: usize = 512;
const FALLBACK_CATEGORY: &str = "другое";
const FALLBACK_CONFIDENCE: f32 = 0.2;

pub struct CategorySpec {
    pub name: &'static str,
    keywords: &'static [&'static str],
}

/// Categories in declared order. Order is the tie-break: when two categories
/// score equal, the one declared first wins.
pub const CATEGORIES: &[CategorySpec] = &[
    CategorySpec {
        name: "документация",
        keywords: &[
            "документац",
            "паспорт",
            "руководство",
            "инструкц",
            "сертификат",
            "схем",
        ],
    },
    CategorySpec {
        name: "калибровка",
        keywords: &["калибровк", "поверк", "градуировк", "юстировк"],
    },
    CategorySpec {
        name: "неисправность",
        keywords: &[
            "не работает",
            "неисправн",
            "сломал",
            "ошибк",
            "сбой",
            "ремонт",
            "вышел из строя",
        ],
    },
    CategorySpec {
        name: "подключение",
        keywords: &[
            "подключ",
            "настройк",
            "modbus",
            "модбас",
            "rs-485",
            "интерфейс",
            "монтаж",
        ],
    },
    CategorySpec {
        name: "гарантия",
        keywords: &["гарант", "брак", "возврат", "рекламац"],
    },
];

pub struct Classifier {
    model: Option<Arc<dyn ZeroShotModel>>,
}

impl Classifier {
    pub fn new(model: Option<Arc<dyn ZeroShotModel>>) -> Self {
        Self { model }
    }

    pub async fn classify(&self, subject: &str, body: &str) -> ClassificationResult {
        let combined = format!("{subject} {body}").to_lowercase();
        let (kw_category, kw_score) = keyword_score(&combined);

        if kw_score >= SHORT_CIRCUIT_SCORE {
            debug!(category = kw_category, score = kw_score, "classified by keywords");
            return ClassificationResult {
                category: kw_category.to_string(),
                confidence: kw_score,
                method: ClassifyMethod::Keywords,
            };
        }

        let (model_category, model_score, model_method) =
            self.classify_by_model(subject, body).await;

        if model_score > kw_score {
            debug!(category = %model_category, score = model_score, "classified by model");
            ClassificationResult {
                category: model_category,
                confidence: model_score,
                method: model_method,
            }
        } else {
            debug!(category = kw_category, score = kw_score, "keeping keyword result");
            ClassificationResult {
                category: kw_category.to_string(),
                confidence: kw_score,
                method: ClassifyMethod::Keywords,
            }
        }
    }

    async fn classify_by_model(&self, subject: &str, body: &str) -> (String, f32, ClassifyMethod) {
        let Some(model) = &self.model else {
            return (
                FALLBACK_CATEGORY.to_string(),
                FALLBACK_CONFIDENCE,
                ClassifyMethod::Fallback,
            );
        };

        let input: String = format!("{subject} {body}")
            .chars()
            .take(MODEL_INPUT_CHARS)
            .collect();
        let candidates: Vec<&str> = CATEGORIES.iter().map(|c| c.name).collect();

        match model.classify(&input, &candidates).await {
            Ok(prediction) => (prediction.label, prediction.confidence, ClassifyMethod::Model),
            Err(err) => {
                warn!(error = %err, "zero-shot classification failed, using fallback");
                (
                    FALLBACK_CATEGORY.to_string(),
                    FALLBACK_CONFIDENCE,
                    ClassifyMethod::Fallback,
                )
            }
        }
    }
}

/// Sum non-overlapping keyword occurrences per category over the lowercased
/// text; score is `min(count / 3, 1.0)`. Strictly-greater comparison keeps
/// the first-declared category on equal scores.
fn keyword_score(combined: &str) -> (&'static str, f32) {
    let mut best: (&'static str, f32) = (FALLBACK_CATEGORY, 0.0);

    for spec in CATEGORIES {
        let count: usize = spec
            .keywords
            .iter()
            .map(|kw| combined.matches(kw).count())
            .sum();
        if count > 0 {
            let score = (count as f32 / 3.0).min(1.0);
            if score > best.1 {
                best = (spec.name, score);
            }
        }
    }

    best
}
