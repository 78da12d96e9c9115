//! Product knowledge base backing reply generation.
//!
//! Static content: company contacts, product entries with detectable gases,
//! per-category reference material and known problem/solution pairs. Ships
//! with built-in defaults and can be replaced wholesale from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    pub website: String,
    pub products_url: String,
    pub files_library: String,
    pub support_phone: String,
    pub support_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEntry {
    pub name: String,
    pub detectable_gases: Vec<String>,
    /// Whether the files library carries documentation for this model.
    pub docs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationInfo {
    pub description: String,
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationInfo {
    pub interval: String,
    pub partners: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub interfaces: Vec<String>,
    pub modbus_settings: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarrantyInfo {
    pub period: String,
    pub claim_procedure: String,
}

/// A known problem and its resolution, tagged with the ticket category it
/// applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub category: String,
    pub problem: String,
    pub solution: String,
}

/// Contact strings a generated reply is allowed (and for some categories
/// required) to contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedContacts {
    pub phones: Vec<String>,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub company: CompanyInfo,
    pub products: Vec<ProductEntry>,
    pub documentation: DocumentationInfo,
    pub calibration: CalibrationInfo,
    pub connection: ConnectionInfo,
    pub warranty: WarrantyInfo,
    pub solutions: Vec<Solution>,
    pub contacts: AllowedContacts,
}

impl KnowledgeBase {
    /// Load from a JSON file, or fall back to the built-in content.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                    key: p.display().to_string(),
                    message: e.to_string(),
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Case-insensitive product lookup by (partial) name.
    pub fn find_product(&self, hint: &str) -> Option<&ProductEntry> {
        let needle = hint.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.products
            .iter()
            .find(|p| p.name.to_lowercase().contains(&needle))
    }

    pub fn is_known_device(&self, hint: &str) -> bool {
        self.find_product(hint).is_some()
    }

    /// Product names to offer when the requested device is unknown.
    /// Prefers IR models and methane-capable detectors.
    pub fn suggestions(&self, limit: usize) -> Vec<&str> {
        self.products
            .iter()
            .filter(|p| {
                p.name.contains("IR")
                    || p.detectable_gases.iter().any(|g| g.contains("CH4"))
            })
            .map(|p| p.name.as_str())
            .take(limit)
            .collect()
    }

    pub fn solutions_for<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Solution> {
        self.solutions.iter().filter(move |s| s.category == category)
    }

    /// True when the text contains any allowed support phone or email.
    pub fn has_allowed_contact(&self, text: &str) -> bool {
        self.contacts
            .phones
            .iter()
            .chain(self.contacts.emails.iter())
            .any(|c| text.contains(c.as_str()))
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            company: CompanyInfo {
                name: "ООО «ЭРИС»".into(),
                website: "https://eriskip.com".into(),
                products_url: "https://eriskip.com/ru/products".into(),
                files_library: "https://eriskip.com/ru/files-library".into(),
                support_phone: "8-800-55-00-715".into(),
                support_email: "service@eriskip.ru".into(),
            },
            products: vec![
                ProductEntry {
                    name: "ДГС ЭРИС-210".into(),
                    detectable_gases: vec!["CH4".into(), "C3H8".into()],
                    docs: true,
                },
                ProductEntry {
                    name: "ДГС ЭРИС-230".into(),
                    detectable_gases: vec![
                        "H2S".into(),
                        "CO".into(),
                        "O2".into(),
                        "SO2".into(),
                        "NH3".into(),
                    ],
                    docs: true,
                },
                ProductEntry {
                    name: "ДГС ЭРИС-210 IR".into(),
                    detectable_gases: vec!["CH4".into(), "CO2".into()],
                    docs: true,
                },
                ProductEntry {
                    name: "ДГС ЭРИС-230 IR".into(),
                    detectable_gases: vec!["CH4".into(), "CO2".into()],
                    docs: true,
                },
                ProductEntry {
                    name: "Advant IR".into(),
                    detectable_gases: vec!["CH4".into(), "CO2".into(), "C3H8".into()],
                    docs: true,
                },
                ProductEntry {
                    name: "ПГ ЭРИС-414".into(),
                    detectable_gases: vec![
                        "CH4".into(),
                        "O2".into(),
                        "CO".into(),
                        "H2S".into(),
                    ],
                    docs: true,
                },
                ProductEntry {
                    name: "ПКГ ЭРИС-411".into(),
                    detectable_gases: vec![
                        "CH4".into(),
                        "O2".into(),
                        "CO".into(),
                        "H2S".into(),
                    ],
                    docs: true,
                },
            ],
            documentation: DocumentationInfo {
                description: "Руководства по эксплуатации, паспорта изделий, методики поверки и перечни ЗИП"
                    .into(),
                includes: vec![
                    "Руководства по эксплуатации (РЭ) и паспорта".into(),
                    "Перечни запасных частей с рекомендуемыми сроками замены".into(),
                    "Методики поверки, сертификаты, 3D-модели".into(),
                ],
            },
            calibration: CalibrationInfo {
                interval: "12 месяцев (межповерочный интервал)".into(),
                partners: vec![
                    "ФБУ «ЦСМ» по месту эксплуатации".into(),
                    "аккредитованные метрологические лаборатории".into(),
                ],
            },
            connection: ConnectionInfo {
                interfaces: vec![
                    "4-20 мА".into(),
                    "RS-485 Modbus RTU".into(),
                    "HART".into(),
                    "релейные выходы".into(),
                ],
                modbus_settings: "9600 бод, 8N1; адрес задаётся в меню прибора".into(),
            },
            warranty: WarrantyInfo {
                period: "24 месяца с даты продажи".into(),
                claim_procedure: "заводской номер, описание отказа и фото шильдика на service@eriskip.ru"
                    .into(),
            },
            solutions: vec![
                Solution {
                    category: "неисправность".into(),
                    problem: "Прибор не выходит на связь по RS-485".into(),
                    solution: "Проверьте полярность линии A/B, скорость обмена и адрес Modbus в меню прибора"
                        .into(),
                },
                Solution {
                    category: "неисправность".into(),
                    problem: "Показания завышены после замены сенсора".into(),
                    solution: "Выполните установку нуля на чистом воздухе и калибровку по ПГС".into(),
                },
                Solution {
                    category: "подключение".into(),
                    problem: "Нет сигнала на токовом выходе".into(),
                    solution: "Проверьте сопротивление нагрузки контура 4-20 мА (не более 500 Ом)"
                        .into(),
                },
                Solution {
                    category: "гарантия".into(),
                    problem: "Отказ прибора в гарантийный период".into(),
                    solution: "Оформите рекламацию через службу поддержки, приложив заводской номер и описание отказа"
                        .into(),
                },
            ],
            contacts: AllowedContacts {
                phones: vec!["8-800-55-00-715".into(), "+7 (34241) 6-55-11".into()],
                emails: vec![
                    "service@eriskip.ru".into(),
                    "docs@eris.ru".into(),
                    "info@eriskip.ru".into(),
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_product_is_case_insensitive() {
        let kb = KnowledgeBase::default();
        assert!(kb.find_product("дгс эрис-210").is_some());
        assert!(kb.find_product("ADVANT").is_some());
        assert!(kb.find_product("Газконтроль-01").is_none());
    }

    #[test]
    fn empty_hint_matches_nothing() {
        let kb = KnowledgeBase::default();
        assert!(kb.find_product("").is_none());
        assert!(kb.find_product("   ").is_none());
    }

    #[test]
    fn suggestions_are_bounded() {
        let kb = KnowledgeBase::default();
        let s = kb.suggestions(3);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn allowed_contact_detection() {
        let kb = KnowledgeBase::default();
        assert!(kb.has_allowed_contact("Звоните 8-800-55-00-715 в любое время"));
        assert!(kb.has_allowed_contact("Пишите на service@eriskip.ru"));
        assert!(!kb.has_allowed_contact("Телефон: 8-999-000-00-00"));
    }

    #[test]
    fn solutions_filtered_by_category() {
        let kb = KnowledgeBase::default();
        assert!(kb.solutions_for("неисправность").count() >= 2);
        assert_eq!(kb.solutions_for("документация").count(), 0);
    }

    #[test]
    fn kb_json_round_trip() {
        let kb = KnowledgeBase::default();
        let json = serde_json::to_string(&kb).unwrap();
        let back: KnowledgeBase = serde_json::from_str(&json).unwrap();
        assert_eq!(back.company.name, kb.company.name);
        assert_eq!(back.products.len(), kb.products.len());
    }
}
