//! Extraction Flow Integration Tests
//!
//! Runs a realistic terminology-service response through parsing,
//! normalization and projection with an in-memory normalization service.

use std::sync::Arc;

use ambient_core::{Category, CodingSystem, NormalizationService, NormalizeRequest, Result};
use ambient_extractor::{EntityClassifier, ExtractionParser, NormalizationDriver};
use serde_json::{json, Value};

const NOTE: &str = "SUBJECTIVE:\nPatient reports chest pain radiating to the left arm.\n\n\
OBJECTIVE:\nTroponin elevated. EKG shows ST elevation.\n\n\
ASSESSMENT:\nAcute STEMI.\n\n\
PLAN:\nCardiac catheterization. Start aspirin 325 mg. Follow-up appointment in one week.\n";

fn span(text: &str) -> (usize, usize) {
    let byte = NOTE.find(text).unwrap();
    let begin = NOTE[..byte].chars().count();
    (begin, begin + text.chars().count())
}

fn entity(id: &str, text: &str, semantic: &str, assertion: &str, code: &str) -> Value {
    let (begin, end) = span(text);
    json!({
        "id": id,
        "text": text,
        "begin": begin,
        "end": end,
        "assertion": assertion,
        "semantic": semantic,
        "codemaps": { "imo": { "lexical_code": code, "lexical_title": text, "confidence": 0.9 } }
    })
}

fn extraction_response() -> Value {
    json!({
        "entities": [
            entity("1", "chest pain", "problem", "present", "100"),
            entity("2", "Troponin", "lab", "present", "200"),
            entity("3", "ST elevation", "problem", "absent", "300"),
            entity("4", "STEMI", "problem", "present", "400"),
            entity("5", "Cardiac catheterization", "procedure", "present", "500"),
            entity("6", "aspirin", "drug", "present", "600"),
            entity("7", "Follow-up appointment", "procedure", "present", "700"),
        ]
    })
}

/// Knows one mapping per domain; everything else fails
struct FixtureNormalizer;

#[async_trait::async_trait]
impl NormalizationService for FixtureNormalizer {
    async fn normalize(&self, request: &NormalizeRequest) -> Result<Value> {
        let mappings = match request.requests[0].domain.as_str() {
            "Problem" if request.requests[0].input_code == "400" => json!({
                "icd10cm": { "codes": [{ "code": "I21.3", "title": "STEMI of unspecified site" }] },
                "snomedInternational": { "codes": [{ "code": "401303003", "title": "Acute STEMI" }] }
            }),
            "Medication" => json!({
                "rxnorm": { "codes": [{ "rxnorm_code": "1191", "rxnorm_titles": [{ "title": "aspirin" }] }] }
            }),
            "Lab" => json!({
                "loinc": { "codes": [{ "code": "6598-7", "title": "Troponin T" }] }
            }),
            _ => {
                return Err(ambient_core::AmbientError::Service(
                    "upstream unavailable".to_string(),
                ))
            }
        };

        Ok(json!({
            "requests": [{ "response": { "items": [{ "metadata": { "mappings": mappings } }] } }]
        }))
    }
}

#[test]
fn test_parse_realistic_response() {
    let outcome = ExtractionParser::new().parse_with_audit(&extraction_response(), NOTE);

    let counts = outcome.entities.counts();
    assert_eq!(counts.problems, 2);
    assert_eq!(counts.procedures, 1);
    assert_eq!(counts.medications, 1);
    assert_eq!(counts.labs, 1);
    assert_eq!(outcome.dropped.len(), 2);

    // the default window covers the whole note
    let stemi = &outcome.entities.problems[1];
    assert_eq!(stemi.text, "STEMI");
    assert_eq!(stemi.context, NOTE.trim());
}

#[test]
fn test_narrow_context_window() {
    let parser =
        ExtractionParser::with_classifier(EntityClassifier::new().with_context_window(6));
    let parsed = parser.parse(&extraction_response(), NOTE);

    assert_eq!(parsed.problems[1].context, "...Acute STEMI.\n\nPLA...");
}

#[tokio::test]
async fn test_parse_then_normalize() {
    let entities = ExtractionParser::new().parse(&extraction_response(), NOTE);
    let driver = NormalizationDriver::new(Arc::new(FixtureNormalizer));

    let coded = driver.normalize_all(entities).await;

    // chest pain fails upstream but is kept
    assert_eq!(coded.problems.len(), 2);
    assert!(!coded.problems[0].is_normalized());
    assert_eq!(coded.problems[0].entity.code, "100");

    assert_eq!(coded.problems[1].code(CodingSystem::Icd10Cm), "I21.3");
    assert_eq!(coded.problems[1].title(CodingSystem::SnomedInternational), "Acute STEMI");
    assert_eq!(coded.medications[0].code(CodingSystem::RxNorm), "1191");
    assert_eq!(coded.get(Category::Lab)[0].code(CodingSystem::Loinc), "6598-7");
    assert!(!coded.procedures[0].is_normalized());
}
