//! Extractive summarizer.
//!
//! No model involved: a short priority ladder picks the most informative
//! piece of the message. Subject line first, then the first sentence that
//! mentions a problem, then the opening sentences, then a raw cut.

use crate::pipeline::types::{SummaryMethod, SummaryResult};

const MAX_LENGTH: usize = 200;
const SENTENCE_COUNT: usize = 2;
const MIN_PROBLEM_SENTENCE_CHARS: usize = 20;

/// Keywords that mark a sentence as describing the actual problem.
const PROBLEM_KEYWORDS: &[&str] = &[
    "не работает",
    "не включается",
    "неисправн",
    "сломал",
    "вышел из строя",
    "перестал",
    "ошибк",
    "сбой",
    "проблем",
    "дефект",
    "помогите",
    "срочно",
];

pub struct Summarizer;

impl Summarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn summarize(&self, body: &str, subject: &str) -> SummaryResult {
        if body.trim().is_empty() {
            return SummaryResult {
                text: String::new(),
                method: SummaryMethod::Empty,
            };
        }

        let text = clean_text(body);
        let subject = clean_text(subject);

        let subject_len = subject.chars().count();
        if (10..=100).contains(&subject_len) {
            return SummaryResult {
                text: subject,
                method: SummaryMethod::Subject,
            };
        }

        let sentences = split_sentences(&text);

        if let Some(sentence) = find_problem_sentence(&sentences)
            && sentence.chars().count() >= MIN_PROBLEM_SENTENCE_CHARS
        {
            return SummaryResult {
                text: truncate_with_ellipsis(sentence, MAX_LENGTH),
                method: SummaryMethod::Keywords,
            };
        }

        if !sentences.is_empty() {
            let take = sentences.len().min(SENTENCE_COUNT);
            let joined = sentences[..take].join(" ");
            return SummaryResult {
                text: truncate_with_ellipsis(&joined, MAX_LENGTH),
                method: SummaryMethod::Sentences,
            };
        }

        SummaryResult {
            text: truncate_with_ellipsis(&text, MAX_LENGTH),
            method: SummaryMethod::Fallback,
        }
    }
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new()
    }
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on `.`/`!`/`?` followed by whitespace. A trailing fragment without
/// terminal punctuation still counts as a sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|&(_, next)| next.is_whitespace())
        {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

fn find_problem_sentence<'a>(sentences: &[&'a str]) -> Option<&'a str> {
    sentences.iter().copied().find(|sentence| {
        let lower = sentence.to_lowercase();
        PROBLEM_KEYWORDS.iter().any(|kw| lower.contains(kw))
    })
}

/// Character-counted cut. The ellipsis is part of the budget, so the result
/// never exceeds `max` characters.
fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informative_subject_wins_verbatim() {
        let s = Summarizer::new();
        let result = s.summarize("Прибор не работает и ничего не помогает.", "Поверка оборудования");
        assert_eq!(result.text, "Поверка оборудования");
        assert_eq!(result.method, SummaryMethod::Subject);
    }

    #[test]
    fn short_subject_falls_to_problem_sentence() {
        let s = Summarizer::new();
        let result = s.summarize(
            "Добрый день. Наш датчик ДГС не работает после грозы. Прошу помочь.",
            "Вопрос",
        );
        assert_eq!(result.text, "Наш датчик ДГС не работает после грозы.");
        assert_eq!(result.method, SummaryMethod::Keywords);
    }

    #[test]
    fn no_keywords_takes_first_two_sentences() {
        let s = Summarizer::new();
        let result = s.summarize(
            "Добрый день уважаемые коллеги. Подскажите режим склада. Заранее благодарю вас.",
            "Hi",
        );
        assert_eq!(result.text, "Добрый день уважаемые коллеги. Подскажите режим склада.");
        assert_eq!(result.method, SummaryMethod::Sentences);
    }

    #[test]
    fn long_problem_sentence_is_truncated() {
        let s = Summarizer::new();
        let body = format!("Прибор не работает {}", "очень ".repeat(40));
        let result = s.summarize(&body, "");
        assert_eq!(result.method, SummaryMethod::Keywords);
        assert_eq!(result.text.chars().count(), 200);
        assert!(result.text.ends_with("..."));
    }

    #[test]
    fn empty_body_short_circuits_everything() {
        let s = Summarizer::new();
        let result = s.summarize("   \n  ", "Поверка оборудования");
        assert_eq!(result.text, "");
        assert_eq!(result.method, SummaryMethod::Empty);
    }

    #[test]
    fn subject_whitespace_is_collapsed() {
        let s = Summarizer::new();
        let result = s.summarize("тело письма", "Вопрос   по    поверке газоанализатора");
        assert_eq!(result.text, "Вопрос по поверке газоанализатора");
        assert_eq!(result.method, SummaryMethod::Subject);
    }

    #[test]
    fn splitter_keeps_trailing_fragment() {
        let sentences = split_sentences("Первое предложение. Второе без точки");
        assert_eq!(sentences, vec!["Первое предложение.", "Второе без точки"]);
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let text = "д".repeat(201);
        let cut = truncate_with_ellipsis(&text, 200);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_with_ellipsis("короткий текст", 200), "короткий текст");
    }
}
