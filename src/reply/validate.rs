//! Draft validation.
//!
//! A cleaned draft still gets rejected when it leaks the prompt, matches a
//! known garbage shape, repeats itself structurally, or omits the support
//! contacts for a category that must carry them. Rejection is not an error:
//! the generator answers with the template instead.

use regex::Regex;

use crate::kb::KnowledgeBase;

const MIN_RESPONSE_CHARS: usize = 30;

/// Categories whose replies must contain a known support phone or email.
pub const REQUIRED_CONTACT_CATEGORIES: &[&str] = &["документация", "калибровка", "гарантия"];

/// Literal prompt fragments that must never reach a customer.
const PROMPT_MARKERS: &[&str] = &[
    "Ты — специалист",
    "КРИТИЧЕСКИЕ ПРАВИЛА",
    "Контекст из базы знаний",
];

/// Known shapes of degenerate generation, matched case-insensitively.
const GARBAGE_PATTERNS: &[&str] = &[
    r"привет\s*[!:.]?\s*я\s+понимаю",
    r"ответ:\s*да,\s*конечно",
    r"буду\s+рад\s+помочь",
    r"пожалуйста,\s*предоставьте\s+мне",
    r"спасибо\s+за\s+ваш[уе]\s+терпени[ея]",
    r"я\s+могу\s+предоставить\s+вам",
    r"\*\*привет\*\*",
    r"---\s*---\s*---",
];

const POLITE_WORDS: &[&str] = &["привет", "пожалуйста", "спасибо", "рад", "помочь", "конечно"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    PromptLeak,
    Garbage,
    RepeatedStructures,
    MissingContact,
}

pub struct Validator {
    garbage: Vec<Regex>,
    qa_echo: Regex,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            garbage: GARBAGE_PATTERNS
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
            qa_echo: Regex::new(r"(вопрос|ответ)\s*[:\-]?\s*(да|нет|конечно|понимаю)").unwrap(),
        }
    }

    pub fn validate(
        &self,
        response: &str,
        category: &str,
        kb: &KnowledgeBase,
    ) -> Result<(), Rejection> {
        if response.chars().count() < MIN_RESPONSE_CHARS {
            return Err(Rejection::TooShort);
        }

        if PROMPT_MARKERS.iter().any(|m| response.contains(m)) {
            return Err(Rejection::PromptLeak);
        }

        if self.is_garbage(response) {
            return Err(Rejection::Garbage);
        }

        if response.matches("Привет").count() > 1 || response.matches("---").count() > 3 {
            return Err(Rejection::RepeatedStructures);
        }

        if REQUIRED_CONTACT_CATEGORIES.contains(&category) && !kb.has_allowed_contact(response) {
            return Err(Rejection::MissingContact);
        }

        Ok(())
    }

    /// Garbage patterns, politeness padding without content, and Q/A
    /// dialogue echo.
    fn is_garbage(&self, response: &str) -> bool {
        let lower = response.to_lowercase();

        if self.garbage.iter().any(|p| p.is_match(&lower)) {
            return true;
        }

        let polite = POLITE_WORDS.iter().filter(|w| lower.contains(*w)).count();
        if polite >= 4 {
            let sentences = response.split('.').filter(|s| !s.trim().is_empty()).count();
            if sentences < 3 {
                return true;
            }
        }

        self.qa_echo.is_match(&lower)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_validator() -> (Validator, KnowledgeBase) {
        (Validator::new(), KnowledgeBase::default())
    }

    #[test]
    fn short_response_rejected() {
        let (v, kb) = make_validator();
        assert_eq!(v.validate("Да.", "другое", &kb), Err(Rejection::TooShort));
    }

    #[test]
    fn prompt_leak_rejected() {
        let (v, kb) = make_validator();
        let text = "Ты — специалист технической поддержки, отвечай клиенту вежливо.";
        assert_eq!(v.validate(text, "другое", &kb), Err(Rejection::PromptLeak));
    }

    #[test]
    fn garbage_opening_rejected() {
        let (v, kb) = make_validator();
        let text = "Здравствуйте! Привет! я понимаю вашу проблему и обязательно разберусь.";
        assert_eq!(v.validate(text, "другое", &kb), Err(Rejection::Garbage));
    }

    #[test]
    fn politeness_padding_without_content_rejected() {
        let (v, kb) = make_validator();
        let text = "Привет, мы очень рады вашему письму. Спасибо, пожалуйста, конечно.";
        assert_eq!(v.validate(text, "другое", &kb), Err(Rejection::Garbage));
    }

    #[test]
    fn dialogue_echo_rejected() {
        let (v, kb) = make_validator();
        let text = "Вопрос: да, производится ли поверка приборов на вашем предприятии.";
        assert_eq!(v.validate(text, "другое", &kb), Err(Rejection::Garbage));
    }

    #[test]
    fn repeated_greeting_rejected() {
        let (v, kb) = make_validator();
        let text = "Привет, коллеги. Привет ещё раз. Проверьте настройки прибора немедленно.";
        assert_eq!(
            v.validate(text, "другое", &kb),
            Err(Rejection::RepeatedStructures)
        );
    }

    #[test]
    fn many_dividers_rejected() {
        let (v, kb) = make_validator();
        let text = "Шаг первый --- шаг второй --- шаг третий --- шаг четвёртый --- готово";
        assert_eq!(
            v.validate(text, "другое", &kb),
            Err(Rejection::RepeatedStructures)
        );
    }

    #[test]
    fn required_category_without_contact_rejected() {
        let (v, kb) = make_validator();
        let text = "Гарантийный срок составляет 24 месяца с даты продажи прибора.";
        assert_eq!(
            v.validate(text, "гарантия", &kb),
            Err(Rejection::MissingContact)
        );
        assert_eq!(v.validate(text, "неисправность", &kb), Ok(()));
    }

    #[test]
    fn valid_reply_passes() {
        let (v, kb) = make_validator();
        let text = "Для поверки обратитесь в аккредитованную лабораторию. Телефон 8-800-55-00-715. Методика доступна в библиотеке файлов.";
        assert_eq!(v.validate(text, "калибровка", &kb), Ok(()));
    }
}
