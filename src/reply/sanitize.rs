//! Draft sanitation.
//!
//! Small generative models echo prompts, repeat themselves and decorate
//! output with markdown scaffolding. The sanitizer strips all of that and
//! gives up (returns `None`) when too little text survives.

use std::collections::HashSet;

use regex::Regex;

/// Everything after the first stop sequence is discarded.
pub const STOP_SEQUENCES: &[&str] = &[
    "\n---",
    "\n\n---",
    "Данные клиента:",
    "Контекст из базы знаний:",
    "Составь ответ",
    "Ты — специалист",
    "КРИТИЧЕСКИЕ ПРАВИЛА",
];

const MIN_CLEAN_CHARS: usize = 20;
const MIN_LINE_CHARS: usize = 5;

pub struct Sanitizer {
    divider_line: Regex,
    format_marker: Regex,
    filler_prefix: Regex,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            divider_line: Regex::new(r"\n\s*---+\s*\n").unwrap(),
            format_marker: Regex::new(r"(?i)\*\*(Ответ|Привет|Вопрос)\*\*[:\s]*").unwrap(),
            filler_prefix: Regex::new(r"(?i)^(ответ|вот\s+ответ|привет)\b[:\s]*").unwrap(),
        }
    }

    /// Clean a raw draft. `None` when fewer than 20 characters survive.
    pub fn clean(&self, draft: &str, prompt: &str) -> Option<String> {
        let mut text = draft.to_string();

        // Some models return prompt + completion as one string.
        let echoed = prompt.trim();
        if !echoed.is_empty() && text.contains(echoed) {
            text = text.replacen(echoed, "", 1);
        }

        for stop in STOP_SEQUENCES {
            if let Some(idx) = text.find(stop) {
                text.truncate(idx);
            }
        }

        let text = self.divider_line.replace_all(&text, "\n");
        let text = self.format_marker.replace_all(&text, "");

        // Dedup lines by normalized text; lines of 5 chars or fewer are
        // treated as noise.
        let mut seen: HashSet<String> = HashSet::new();
        let mut unique: Vec<&str> = Vec::new();
        for line in text.trim().lines() {
            let trimmed = line.trim();
            if trimmed.chars().count() > MIN_LINE_CHARS && seen.insert(trimmed.to_lowercase()) {
                unique.push(line);
            }
        }
        let text = unique.join("\n");

        let text = self
            .filler_prefix
            .replace(text.trim(), "")
            .trim()
            .to_string();

        (text.chars().count() >= MIN_CLEAN_CHARS).then_some(text)
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_at_first_stop_sequence() {
        let s = Sanitizer::new();
        let draft = "Проверьте настройки прибора по инструкции.\nСоставь ответ на вопрос клиента";
        let clean = s.clean(draft, "").unwrap();
        assert_eq!(clean, "Проверьте настройки прибора по инструкции.");
    }

    #[test]
    fn strips_echoed_prompt() {
        let s = Sanitizer::new();
        let prompt = "Подготовь вежливое письмо клиенту по теме поверки газоанализатора";
        let draft = format!("{prompt}\nПриезжайте на поверку в аккредитованную лабораторию в любой день.");
        let clean = s.clean(&draft, prompt).unwrap();
        assert_eq!(
            clean,
            "Приезжайте на поверку в аккредитованную лабораторию в любой день."
        );
    }

    #[test]
    fn dedups_repeated_lines() {
        let s = Sanitizer::new();
        let draft = "Проверьте питание прибора.\nПроверьте питание прибора.\nПроверьте кабель RS-485.";
        let clean = s.clean(draft, "").unwrap();
        assert_eq!(
            clean,
            "Проверьте питание прибора.\nПроверьте кабель RS-485."
        );
    }

    #[test]
    fn drops_markers_and_short_lines() {
        let s = Sanitizer::new();
        let draft = "**Ответ**: Настройте адрес Modbus в меню.\nОК";
        let clean = s.clean(draft, "").unwrap();
        assert_eq!(clean, "Настройте адрес Modbus в меню.");
    }

    #[test]
    fn filler_prefix_stripped_but_real_words_kept() {
        let s = Sanitizer::new();
        let clean = s
            .clean("Ответ: обратитесь в сервисный центр по месту эксплуатации.", "")
            .unwrap();
        assert_eq!(clean, "обратитесь в сервисный центр по месту эксплуатации.");

        let kept = s
            .clean("Ответственный инженер свяжется с вами в течение рабочего дня.", "")
            .unwrap();
        assert!(kept.starts_with("Ответственный"));
    }

    #[test]
    fn too_little_text_is_rejected() {
        let s = Sanitizer::new();
        assert_eq!(s.clean("Да, конечно.", ""), None);
        assert_eq!(s.clean("", ""), None);
    }

    #[test]
    fn prompt_echo_alone_is_rejected() {
        let s = Sanitizer::new();
        let prompt = "Подготовь вежливое письмо клиенту по теме поверки";
        assert_eq!(s.clean(prompt, prompt), None);
    }
}
