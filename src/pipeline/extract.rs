//! Entity extraction: devices, serials, contacts, names, organizations.
//!
//! Pure and deterministic — regex plus catalog lookups, no model calls.
//! A miss is an empty collection or `None`, never an error.

use regex::Regex;

use crate::catalog::ProductCatalog;
use crate::pipeline::types::{DeviceMatch, DeviceMatchMethod, ExtractionResult};

pub struct Extractor {
    catalog: ProductCatalog,
    phone: Regex,
    email: Regex,
    fio: Regex,
    org_patterns: Vec<Regex>,
}

impl Extractor {
    pub fn new(catalog: ProductCatalog) -> Self {
        let phone = Regex::new(
            r"(?x)
            (?:\+7|7|8)?        # country prefix
            [\s-]?
            \(?\d{3}\)?         # area code, parens optional
            [\s-]?
            \d{3}
            [\s-]?
            \d{2}
            [\s-]?
            \d{2}
            ",
        )
        .unwrap();

        let email = Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap();

        // Three consecutive Title-Case Cyrillic tokens, optionally labelled.
        let fio = Regex::new(
            r"(?:ФИО[:\s]|От[:\s]|Фамилия[:\s])?\s*([А-ЯЁ][а-яё]+\s+[А-ЯЁ][а-яё]+\s+[А-ЯЁ][а-яё]+)",
        )
        .unwrap();

        // Legal-form prefix first, looser label form second.
        let org_patterns = vec![
            Regex::new(r#"(?:(?i:ООО|АО|ЗАО|ПАО|ИП))\s*["«]?([А-ЯЁ][а-яё\-\s]+)["»]?"#).unwrap(),
            Regex::new(r"(?i:предприятие|объект|организация|компания)[:\s]+([А-ЯЁ][а-яё\-\s]+)")
                .unwrap(),
        ];

        Self {
            catalog,
            phone,
            email,
            fio,
            org_patterns,
        }
    }

    /// Run every extractor over one message.
    pub fn extract(&self, subject: &str, body: &str, sender_name: &str) -> ExtractionResult {
        ExtractionResult {
            devices: self.find_devices(subject, body),
            serial_numbers: self.find_serials(body),
            phones: self.find_phones(body),
            emails: self.find_emails(body),
            fio: self.find_fio(body, sender_name),
            organization: self.find_organization(body),
        }
    }

    /// Catalog models by case-insensitive substring, exact names before
    /// synonyms. A model already matched exactly is not re-added via a
    /// synonym.
    fn find_devices(&self, subject: &str, body: &str) -> Vec<DeviceMatch> {
        let combined = format!("{subject} {body}").to_uppercase();
        let mut found: Vec<DeviceMatch> = Vec::new();

        for model in self.catalog.models() {
            if combined.contains(&model.to_uppercase()) {
                found.push(DeviceMatch {
                    model: model.to_string(),
                    category: self.catalog.category_of(model).to_string(),
                    method: DeviceMatchMethod::Exact,
                });
            }
        }

        for entry in self.catalog.synonyms() {
            if found.iter().any(|m| m.model == entry.model) {
                continue;
            }
            if entry
                .synonyms
                .iter()
                .any(|s| combined.contains(&s.to_uppercase()))
            {
                found.push(DeviceMatch {
                    model: entry.model.to_string(),
                    category: self.catalog.category_of(entry.model).to_string(),
                    method: DeviceMatchMethod::Synonym,
                });
            }
        }

        found
    }

    /// Serial numbers: patterns in declared order, every capture stripped to
    /// its hex characters, first-seen order, exact-string dedup.
    fn find_serials(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();

        for pattern in self.catalog.serial_patterns() {
            for caps in pattern.captures_iter(text) {
                let raw = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let number: String = raw.chars().filter(|c| c.is_ascii_hexdigit()).collect();
                if !number.is_empty() && !found.contains(&number) {
                    found.push(number);
                }
            }
        }

        found
    }

    fn find_phones(&self, text: &str) -> Vec<String> {
        self.phone
            .find_iter(text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn find_emails(&self, text: &str) -> Vec<String> {
        self.email
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Sender display name wins when it is longer than 5 characters;
    /// otherwise the first Title-Case triple in the body.
    fn find_fio(&self, text: &str, sender_name: &str) -> Option<String> {
        if !sender_name.is_empty() && sender_name.chars().count() > 5 {
            return Some(sender_name.to_string());
        }

        self.fio
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    fn find_organization(&self, text: &str) -> Option<String> {
        for pattern in &self.org_patterns {
            if let Some(caps) = pattern.captures(text)
                && let Some(m) = caps.get(1)
            {
                return Some(m.as_str().trim().to_string());
            }
        }
        None
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ProductCatalog::new())
    }
}
