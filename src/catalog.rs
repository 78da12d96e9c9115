//! Device catalog for the ЭРИС product line.
//!
//! Model names, synonym spellings and serial-number patterns used by the
//! entity extractor. Declared order is load-bearing: device matching walks
//! the tables top to bottom, so results are deterministic across runs.

use regex::Regex;

/// A product family: catalog category plus its model names.
pub struct ProductFamily {
    pub category: &'static str,
    pub models: &'static [&'static str],
}

/// Families in declared order. Stationary detectors first, portables second.
pub const PRODUCT_FAMILIES: &[ProductFamily] = &[
    ProductFamily {
        category: "стационарный",
        models: &[
            "ДГС ЭРИС-210",
            "ДГС ЭРИС-230",
            "ДГС ЭРИС-210 IR",
            "ДГС ЭРИС-230 IR",
            "Advant IR",
        ],
    },
    ProductFamily {
        category: "переносной",
        models: &["ПГ ЭРИС-414", "ПКГ ЭРИС-411", "ПГ ЭРИС-411"],
    },
];

/// Alternate spellings customers actually use.
pub struct SynonymEntry {
    pub model: &'static str,
    pub synonyms: &'static [&'static str],
}

pub const PRODUCT_SYNONYMS: &[SynonymEntry] = &[
    SynonymEntry {
        model: "ДГС ЭРИС-210",
        synonyms: &["ДГС-210", "ЭРИС-210", "ЭРИС 210"],
    },
    SynonymEntry {
        model: "ДГС ЭРИС-230",
        synonyms: &["ДГС-230", "ЭРИС-230", "ЭРИС 230"],
    },
    SynonymEntry {
        model: "ПКГ ЭРИС-411",
        synonyms: &["ПКГ-411", "ПКГ 411"],
    },
    SynonymEntry {
        model: "ПГ ЭРИС-414",
        synonyms: &["ПГ-414", "ЭРИС-414"],
    },
    SynonymEntry {
        model: "Advant IR",
        synonyms: &["Advant", "Адвант"],
    },
];

/// Serial-number patterns in match order: labelled forms first, bare hex
/// runs last. Captures are normalized downstream by stripping non-hex chars.
const SERIAL_PATTERNS: &[&str] = &[
    r"(?i)(?:зав(?:одской)?\.?\s*(?:№|номер)|серийный\s+номер|s/?n|с/н)\s*[-:№#]?\s*([0-9a-f][0-9a-f\s/-]*[0-9a-f])",
    r"\b[0-9A-Fa-f]{6,}\b",
];

/// Compiled device catalog handed to the extractor.
pub struct ProductCatalog {
    serial_patterns: Vec<Regex>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        let serial_patterns = SERIAL_PATTERNS
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect();
        Self { serial_patterns }
    }

    /// All model names in declared order.
    pub fn models(&self) -> impl Iterator<Item = &'static str> {
        PRODUCT_FAMILIES.iter().flat_map(|f| f.models.iter().copied())
    }

    pub fn synonyms(&self) -> &'static [SynonymEntry] {
        PRODUCT_SYNONYMS
    }

    /// Catalog category for a model; unmapped models are `other`.
    pub fn category_of(&self, model: &str) -> &'static str {
        PRODUCT_FAMILIES
            .iter()
            .find(|f| f.models.contains(&model))
            .map(|f| f.category)
            .unwrap_or("other")
    }

    pub fn serial_patterns(&self) -> &[Regex] {
        &self.serial_patterns
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_lookup() {
        let cat = ProductCatalog::new();
        assert_eq!(cat.category_of("ДГС ЭРИС-230"), "стационарный");
        assert_eq!(cat.category_of("ПГ ЭРИС-414"), "переносной");
        assert_eq!(cat.category_of("Неведомый прибор"), "other");
    }

    #[test]
    fn model_order_is_declared_order() {
        let cat = ProductCatalog::new();
        let models: Vec<_> = cat.models().collect();
        assert_eq!(models[0], "ДГС ЭРИС-210");
        assert!(models.contains(&"Advant IR"));
    }

    #[test]
    fn labelled_serial_pattern_captures_value() {
        let cat = ProductCatalog::new();
        let labelled = &cat.serial_patterns()[0];
        let caps = labelled.captures("зав. № 12AB34 вышел из строя").unwrap();
        assert_eq!(caps.get(1).unwrap().as_str().trim(), "12AB34");
    }

    #[test]
    fn bare_serial_pattern_matches_hex_run() {
        let cat = ProductCatalog::new();
        let bare = &cat.serial_patterns()[1];
        assert!(bare.is_match("прибор 12ab34 не отвечает"));
        assert!(!bare.is_match("прибор 12a не отвечает"));
    }
}
