//! Extraction response parsing
//!
//! Drives the classifier across a whole terminology-service response and
//! collects survivors into per-category lists in source order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ambient_core::{CategorizedEntities, ExtractionConfig, RawEntity};

use crate::classify::{DropReason, EntityClassifier, Verdict};

/// An entity the classifier filtered out, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedEntity {
    pub entity_id: String,
    pub text: String,
    pub semantic: String,
    pub reason: DropReason,
}

/// Categorized entities together with everything that was dropped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub entities: CategorizedEntities,
    pub dropped: Vec<DroppedEntity>,
}

/// The response's entity list, if it carries one
pub fn entity_list(response: &Value) -> Option<&Vec<Value>> {
    response.get("entities").and_then(Value::as_array)
}

/// Parser for entity extraction responses
#[derive(Debug, Clone, Default)]
pub struct ExtractionParser {
    classifier: EntityClassifier,
}

impl ExtractionParser {
    /// Create a parser with the default classification rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser from configuration
    pub fn with_config(config: &ExtractionConfig) -> Self {
        Self {
            classifier: EntityClassifier::with_config(config),
        }
    }

    /// Create a parser around an existing classifier
    pub fn with_classifier(classifier: EntityClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &EntityClassifier {
        &self.classifier
    }

    /// Parse a response into category lists; dropped entities are discarded
    pub fn parse(&self, response: &Value, source_text: &str) -> CategorizedEntities {
        self.parse_with_audit(response, source_text).entities
    }

    /// Parse a response, also reporting every dropped entity and why
    pub fn parse_with_audit(&self, response: &Value, source_text: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        let Some(entities) = entity_list(response) else {
            tracing::debug!("Response carries no entity list");
            return outcome;
        };

        tracing::debug!("Parsing {} entities from response", entities.len());

        for value in entities {
            let raw = RawEntity::from(value);
            match self.classifier.classify(&raw, source_text) {
                Verdict::Keep(category, entity) => outcome.entities.push(category, entity),
                Verdict::Drop(reason) => {
                    tracing::debug!(entity_id = %raw.id, text = %raw.text, %reason, "Dropping entity");
                    outcome.dropped.push(DroppedEntity {
                        entity_id: raw.id,
                        text: raw.text,
                        semantic: raw.semantic,
                        reason,
                    });
                }
            }
        }

        let counts = outcome.entities.counts();
        tracing::info!(
            problems = counts.problems,
            procedures = counts.procedures,
            medications = counts.medications,
            labs = counts.labs,
            dropped = outcome.dropped.len(),
            "Extraction response parsed"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambient_core::Category;
    use serde_json::json;

    fn entity(id: &str, text: &str, assertion: &str, semantic: &str) -> Value {
        json!({
            "id": id,
            "text": text,
            "begin": 0,
            "end": text.len(),
            "assertion": assertion,
            "semantic": semantic,
            "codemaps": { "imo": { "lexical_code": format!("code-{id}") } }
        })
    }

    #[test]
    fn test_missing_entity_list_yields_empty_lists() {
        let parser = ExtractionParser::new();

        let parsed = parser.parse(&json!({ "sentences": [] }), "text");
        assert!(parsed.is_empty());

        let parsed = parser.parse(&json!({ "entities": "oops" }), "text");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_source_order_preserved_per_category() {
        let response = json!({
            "entities": [
                entity("1", "hypertension", "present", "problem"),
                entity("2", "aspirin", "present", "drug"),
                entity("3", "diabetes", "present", "problem"),
                entity("4", "troponin", "present", "lab"),
                entity("5", "metformin", "present", "medication"),
                entity("6", "catheterization", "present", "procedure"),
            ]
        });

        let parsed = ExtractionParser::new().parse(&response, "");

        let problems: Vec<&str> = parsed.problems.iter().map(|e| e.text.as_str()).collect();
        let meds: Vec<&str> = parsed.medications.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(problems, vec!["hypertension", "diabetes"]);
        assert_eq!(meds, vec!["aspirin", "metformin"]);
        assert_eq!(parsed.get(Category::Lab)[0].code, "code-4");
        assert_eq!(parsed.procedures.len(), 1);
    }

    #[test]
    fn test_audit_reports_drop_reasons() {
        let response = json!({
            "entities": [
                entity("1", "chest pain", "absent", "problem"),
                entity("2", "follow-up visit", "present", "procedure"),
                entity("3", "smoker", "present", "social_factor"),
                entity("4", "stemi", "present", "problem"),
            ]
        });

        let outcome = ExtractionParser::new().parse_with_audit(&response, "");

        assert_eq!(outcome.entities.total(), 1);
        assert_eq!(outcome.dropped.len(), 3);
        assert_eq!(
            outcome.dropped[0].reason,
            DropReason::Assertion("absent".to_string())
        );
        assert_eq!(
            outcome.dropped[1].reason,
            DropReason::IgnoredText("follow-up".to_string())
        );
        assert_eq!(
            outcome.dropped[2].reason,
            DropReason::UnmatchedSemantic("social_factor".to_string())
        );
        assert_eq!(outcome.dropped[2].entity_id, "3");
    }

    #[test]
    fn test_malformed_entities_do_not_abort_siblings() {
        let response = json!({
            "entities": [
                null,
                42,
                { "assertion": "present", "semantic": "problem", "begin": "x" },
                entity("ok", "asthma", "present", "problem"),
            ]
        });

        let outcome = ExtractionParser::new().parse_with_audit(&response, "");

        // the sparse object is still a present problem with empty text
        assert_eq!(outcome.entities.problems.len(), 2);
        assert_eq!(outcome.entities.problems[1].text, "asthma");
        assert_eq!(outcome.dropped.len(), 2);
    }

    #[test]
    fn test_extreme_offsets_do_not_abort_siblings() {
        let response = json!({
            "entities": [
                { "text": "asthma", "assertion": "present", "semantic": "problem",
                  "begin": i64::MIN, "end": 5 },
                { "text": "emphysema", "assertion": "present", "semantic": "problem",
                  "begin": i64::MAX, "end": i64::MIN },
                { "text": "copd", "assertion": "present", "semantic": "problem",
                  "begin": 0, "end": 4 },
            ]
        });

        let entities = ExtractionParser::new().parse(&response, "copd and asthma");

        assert_eq!(entities.problems.len(), 3);
        assert_eq!(entities.problems[0].length, i64::MAX);
        assert_eq!(entities.problems[1].length, i64::MIN);
        assert_eq!(entities.problems[2].text, "copd");
        assert_eq!(entities.problems[2].context, "copd and asthma");
    }
}
