//! Entity classification and filtering
//!
//! Decides whether one terminology-service entity is kept and, if so,
//! which output category it lands in. Decision order is fixed and the
//! first failing rule wins:
//! 1. assertion must be `present`
//! 2. entity text must not contain an ignore pattern
//! 3. the semantic label must hit one of the ordered keyword groups

use serde::{Deserialize, Serialize};

use ambient_core::{
    Category, CategoryKeywords, ClassifiedEntity, ExtractionConfig, RawEntity,
};

use crate::context::extract_context;

/// Why an entity was filtered out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DropReason {
    /// Assertion other than `present`, as received
    Assertion(String),
    /// Entity text contained this ignore pattern
    IgnoredText(String),
    /// Semantic label matched no category keyword
    UnmatchedSemantic(String),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assertion(a) => write!(f, "assertion '{a}' is not present"),
            Self::IgnoredText(p) => write!(f, "text matches ignore pattern '{p}'"),
            Self::UnmatchedSemantic(s) => write!(f, "semantic '{s}' has no category"),
        }
    }
}

/// Outcome of classifying one entity
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Keep(Category, ClassifiedEntity),
    Drop(DropReason),
}

impl Verdict {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep(..))
    }
}

/// Rule-based entity classifier
#[derive(Debug, Clone)]
pub struct EntityClassifier {
    /// Lower-cased ignore patterns
    ignore_patterns: Vec<String>,
    /// Ordered keyword groups, lower-cased
    category_keywords: Vec<CategoryKeywords>,
    /// Characters of context on each side of the span
    context_window: usize,
}

impl EntityClassifier {
    /// Create a classifier with the default rules
    pub fn new() -> Self {
        Self::with_config(&ExtractionConfig::default())
    }

    /// Create a classifier from configuration
    pub fn with_config(config: &ExtractionConfig) -> Self {
        Self {
            ignore_patterns: config
                .ignore_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            category_keywords: config
                .category_keywords
                .iter()
                .map(|group| CategoryKeywords {
                    category: group.category,
                    keywords: group.keywords.iter().map(|k| k.to_lowercase()).collect(),
                })
                .collect(),
            context_window: config.context_window,
        }
    }

    /// Set the context window
    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Classify one entity against the text its offsets refer to
    pub fn classify(&self, raw: &RawEntity, source_text: &str) -> Verdict {
        if !is_present(&raw.assertion) {
            return Verdict::Drop(DropReason::Assertion(raw.assertion.clone()));
        }

        if let Some(pattern) = self.ignored_pattern(&raw.text) {
            return Verdict::Drop(DropReason::IgnoredText(pattern.to_string()));
        }

        let Some(category) = self.categorize(&raw.semantic) else {
            return Verdict::Drop(DropReason::UnmatchedSemantic(raw.semantic.clone()));
        };

        let imo = raw.codemaps.imo();
        let length = raw.length();

        let entity = ClassifiedEntity {
            text: raw.text.clone(),
            code: imo.lexical_code,
            code_system: "IMO".to_string(),
            description: imo.lexical_title,
            offset: raw.begin,
            length,
            confidence: imo.confidence,
            context: extract_context(source_text, raw.begin, length, self.context_window),
            entity_id: raw.id.clone(),
            semantic: raw.semantic.clone(),
            assertion: raw.assertion.clone(),
            codemaps: raw.codemaps.clone(),
        };

        Verdict::Keep(category, entity)
    }

    /// First ignore pattern contained in the entity text
    pub fn ignored_pattern(&self, text: &str) -> Option<&str> {
        let text = text.trim().to_lowercase();
        self.ignore_patterns
            .iter()
            .find(|pattern| text.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Category of a semantic label; the first keyword group with a hit wins
    pub fn categorize(&self, semantic: &str) -> Option<Category> {
        let semantic = semantic.to_lowercase();
        self.category_keywords
            .iter()
            .find(|group| group.keywords.iter().any(|k| semantic.contains(k.as_str())))
            .map(|group| group.category)
    }
}

impl Default for EntityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn is_present(assertion: &str) -> bool {
    assertion.trim().eq_ignore_ascii_case("present")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(text: &str, assertion: &str, semantic: &str) -> RawEntity {
        RawEntity::from(&json!({
            "id": "e1",
            "text": text,
            "begin": 0,
            "end": text.chars().count(),
            "assertion": assertion,
            "semantic": semantic,
            "codemaps": {
                "imo": { "lexical_code": "84356", "lexical_title": "Hypertension", "confidence": 0.97 }
            }
        }))
    }

    #[test]
    fn test_non_present_assertions_dropped() {
        let classifier = EntityClassifier::new();

        for assertion in ["ABSENT", "Possible", "absent", "", "presentish"] {
            let verdict = classifier.classify(&raw("hypertension", assertion, "problem"), "");
            assert_eq!(
                verdict,
                Verdict::Drop(DropReason::Assertion(assertion.to_string())),
                "assertion {assertion:?} should be dropped"
            );
        }
    }

    #[test]
    fn test_present_is_case_insensitive_after_trim() {
        let classifier = EntityClassifier::new();

        for assertion in ["present", "PRESENT", "Present", "present "] {
            let verdict = classifier.classify(&raw("hypertension", assertion, "problem"), "");
            assert!(verdict.is_keep(), "assertion {assertion:?} should be kept");
        }
    }

    #[test]
    fn test_ignore_patterns_checked_before_category() {
        let classifier = EntityClassifier::new();

        let verdict = classifier.classify(&raw("  Patient Education ", "present", "procedure"), "");
        assert_eq!(
            verdict,
            Verdict::Drop(DropReason::IgnoredText("patient education".to_string()))
        );

        // "assessment" and "plan" are ignore patterns even though they are section names
        let verdict = classifier.classify(&raw("treatment plan", "present", "procedure"), "");
        assert_eq!(verdict, Verdict::Drop(DropReason::IgnoredText("plan".to_string())));
    }

    #[test]
    fn test_procedure_labels() {
        let classifier = EntityClassifier::new();
        assert_eq!(classifier.categorize("Surgical Procedure"), Some(Category::Procedure));
        assert_eq!(classifier.categorize("PROCEDURE NOTE"), Some(Category::Procedure));
        assert_eq!(classifier.categorize("imo_procedure"), Some(Category::Procedure));
    }

    #[test]
    fn test_category_groups_in_order() {
        let classifier = EntityClassifier::new();
        assert_eq!(classifier.categorize("problem"), Some(Category::Problem));
        assert_eq!(classifier.categorize("Diagnosis"), Some(Category::Problem));
        assert_eq!(classifier.categorize("drug"), Some(Category::Medication));
        assert_eq!(classifier.categorize("clinical_observation"), Some(Category::Lab));
        assert_eq!(classifier.categorize("test"), Some(Category::Lab));
        // problem group is checked before lab
        assert_eq!(classifier.categorize("condition test"), Some(Category::Problem));
        assert_eq!(classifier.categorize("social_factor"), None);
    }

    #[test]
    fn test_unmatched_semantic_dropped() {
        let classifier = EntityClassifier::new();
        let verdict = classifier.classify(&raw("smoker", "present", "social_factor"), "");
        assert_eq!(
            verdict,
            Verdict::Drop(DropReason::UnmatchedSemantic("social_factor".to_string()))
        );
    }

    #[test]
    fn test_kept_entity_fields() {
        let classifier = EntityClassifier::new();
        let text = "History of hypertension, well controlled.";
        let entity = RawEntity {
            begin: 11,
            end: 23,
            ..raw("hypertension", "present", "problem")
        };

        let Verdict::Keep(category, classified) = classifier.classify(&entity, text) else {
            panic!("entity should be kept");
        };

        assert_eq!(category, Category::Problem);
        assert_eq!(classified.code, "84356");
        assert_eq!(classified.code_system, "IMO");
        assert_eq!(classified.description, "Hypertension");
        assert_eq!(classified.offset, 11);
        assert_eq!(classified.length, 12);
        assert!((classified.confidence - 0.97).abs() < 1e-9);
        assert_eq!(classified.context, text);
        assert_eq!(classified.entity_id, "e1");
        assert!(classified.codemaps.get("imo").is_some());
    }

    #[test]
    fn test_sparse_entity_defaults() {
        let classifier = EntityClassifier::new();
        let entity = RawEntity::from(&json!({
            "text": "troponin",
            "assertion": "present",
            "semantic": "lab"
        }));

        let Verdict::Keep(category, classified) = classifier.classify(&entity, "") else {
            panic!("sparse entity should still be kept");
        };
        assert_eq!(category, Category::Lab);
        assert_eq!(classified.code, "");
        assert_eq!(classified.description, "");
        assert_eq!(classified.confidence, 0.0);
        assert_eq!(classified.context, "");
    }

    #[test]
    fn test_custom_rules() {
        let config = ExtractionConfig {
            context_window: 5,
            ignore_patterns: vec!["Smoking".to_string()],
            category_keywords: vec![CategoryKeywords {
                category: Category::Problem,
                keywords: vec!["Social".to_string()],
            }],
        };
        let classifier = EntityClassifier::with_config(&config);

        assert_eq!(classifier.context_window(), 5);
        assert_eq!(classifier.ignored_pattern("smoking history"), Some("smoking"));
        assert_eq!(classifier.categorize("social_factor"), Some(Category::Problem));
        assert_eq!(classifier.categorize("problem"), None);
    }
}
