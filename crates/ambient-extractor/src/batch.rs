//! Cohort batch aggregation
//!
//! Flattens pre-fetched extraction payloads from many documents into one
//! list of workbook records, in caller order. Writing the workbook itself
//! is left to the caller; [`WORKBOOK_COLUMNS`] and [`WorkbookRecord::to_row`]
//! fix the column layout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ambient_core::{value, BatchConfig, CodingSystem, LinkedEntity, RawEntity, Result};

use crate::codemap;
use crate::parse::entity_list;

/// Context used when sentences exist but none contains the entity
pub const NO_SENTENCE_FOUND: &str = "ERROR: No sentence found.";

/// Workbook header row, in column order
pub const WORKBOOK_COLUMNS: [&str; 22] = [
    "Hospital GUID",
    "Encounter GUID",
    "Patient GUID",
    "Filename",
    "Processing Time (s)",
    "Context",
    "Section",
    "Entity",
    "Complete Entity",
    "Semantic Tag",
    "Semantic Category",
    "Status",
    "Lexical Code",
    "Lexical Title",
    "Default Lexical Code",
    "Default Lexical Title",
    "Confidence",
    "ICD10CM",
    "SNOMED International",
    "CPT",
    "LOINC",
    "RXNORM",
];

// ============================================================================
// Input Documents
// ============================================================================

/// One pre-fetched document in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDocument {
    pub file_name: String,

    /// Extraction response: `{entities, sentences?, content?}`
    pub payload: Value,

    /// Processing duration as reported by the caller
    pub run_time: String,

    pub hospital_guid: Option<String>,
    pub encounter_guid: Option<String>,
    pub patient_guid: Option<String>,
}

impl BatchDocument {
    pub fn new(file_name: impl Into<String>, payload: Value) -> Self {
        Self {
            file_name: file_name.into(),
            payload,
            run_time: String::new(),
            hospital_guid: None,
            encounter_guid: None,
            patient_guid: None,
        }
    }

    /// Set the processing duration
    pub fn with_run_time(mut self, run_time: impl Into<String>) -> Self {
        self.run_time = run_time.into();
        self
    }

    /// Set the hospital, encounter and patient identifiers
    pub fn with_guids(
        mut self,
        hospital: Option<String>,
        encounter: Option<String>,
        patient: Option<String>,
    ) -> Self {
        self.hospital_guid = hospital;
        self.encounter_guid = encounter;
        self.patient_guid = patient;
        self
    }

    /// Lift a document from its manifest entry
    /// (`{payload, run_time?, hospitalGuid?, encounterGuid?, patientGuid?}`)
    pub fn from_entry(file_name: impl Into<String>, entry: &Value) -> Self {
        Self {
            file_name: file_name.into(),
            payload: entry.get("payload").cloned().unwrap_or(Value::Null),
            run_time: value::string_at(entry, "run_time"),
            hospital_guid: value::opt_string_at(entry, "hospitalGuid"),
            encounter_guid: value::opt_string_at(entry, "encounterGuid"),
            patient_guid: value::opt_string_at(entry, "patientGuid"),
        }
    }

    /// Lift every document from a manifest.
    ///
    /// Accepts an object keyed by file name (order preserved) or an array of
    /// entries that carry their own `file_name`.
    pub fn from_manifest(manifest: &Value) -> Result<Vec<Self>> {
        match manifest {
            Value::Object(entries) => Ok(entries
                .iter()
                .map(|(name, entry)| Self::from_entry(name.as_str(), entry))
                .collect()),
            Value::Array(entries) => Ok(entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    let name = value::opt_string_at(entry, "file_name")
                        .unwrap_or_else(|| format!("document-{}", i + 1));
                    Self::from_entry(name, entry)
                })
                .collect()),
            _ => Err(ambient_core::AmbientError::Validation(
                "batch manifest must be an object or an array".to_string(),
            )),
        }
    }

    /// Note text carried in the payload
    pub fn content(&self) -> String {
        value::string_at(&self.payload, "content")
    }
}

// ============================================================================
// Output Records
// ============================================================================

/// One flattened entity row of the cohort workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbookRecord {
    pub hospital_guid: Option<String>,
    pub encounter_guid: Option<String>,
    pub patient_guid: Option<String>,
    pub file_name: String,
    pub run_time: String,
    pub context: String,
    pub section: String,
    pub text: String,
    pub begin: i64,
    pub end: i64,
    pub complete_entity: String,
    pub semantic_tag: String,
    pub semantic_category: String,
    pub assertion: String,
    pub lexical_code: String,
    pub lexical_title: String,
    pub default_lexical_code: String,
    pub default_lexical_title: String,
    pub confidence: Option<f64>,
    pub icd10cm: String,
    pub snomed_international: String,
    pub cpt: String,
    pub loinc: String,
    pub rxnorm: String,
}

impl WorkbookRecord {
    /// Cells in [`WORKBOOK_COLUMNS`] order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.hospital_guid.clone().unwrap_or_default(),
            self.encounter_guid.clone().unwrap_or_default(),
            self.patient_guid.clone().unwrap_or_default(),
            self.file_name.clone(),
            self.run_time.clone(),
            self.context.clone(),
            self.section.clone(),
            self.text.clone(),
            self.complete_entity.clone(),
            self.semantic_tag.clone(),
            self.semantic_category.clone(),
            self.assertion.clone(),
            self.lexical_code.clone(),
            self.lexical_title.clone(),
            self.default_lexical_code.clone(),
            self.default_lexical_title.clone(),
            self.confidence.map(|c| c.to_string()).unwrap_or_default(),
            self.icd10cm.clone(),
            self.snomed_international.clone(),
            self.cpt.clone(),
            self.loinc.clone(),
            self.rxnorm.clone(),
        ]
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Text of the first sentence whose span contains `[begin, end]`
pub fn sentence_context(begin: i64, end: i64, sentences: &[Value]) -> String {
    sentences
        .iter()
        .find(|s| value::i64_at(s, "begin") <= begin && value::i64_at(s, "end") >= end)
        .map(|s| value::string_at(s, "text"))
        .unwrap_or_else(|| NO_SENTENCE_FOUND.to_string())
}

/// Entity text joined with its linked spans, ordered by begin offset.
///
/// A linked entity's begin offset is the numeric prefix of its id
/// (`"<begin>_..."`); links without one are skipped. A link sharing the
/// entity's offset replaces its text.
pub fn complete_entity(text: &str, begin: i64, linked: &[LinkedEntity]) -> String {
    if linked.is_empty() {
        return text.to_string();
    }

    let mut spans = BTreeMap::new();
    spans.insert(begin, text);

    for link in linked {
        let Some(offset) = link
            .id
            .split('_')
            .next()
            .and_then(|prefix| prefix.trim().parse::<i64>().ok())
        else {
            tracing::debug!(id = %link.id, "Linked entity id has no numeric offset");
            continue;
        };
        spans.insert(offset, link.text.as_str());
    }

    spans.into_values().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Aggregator
// ============================================================================

/// Flattens extraction payloads into workbook records
#[derive(Debug, Clone)]
pub struct BatchAggregator {
    valid_entity_types: Vec<String>,
}

impl BatchAggregator {
    pub fn new() -> Self {
        Self::with_config(&BatchConfig::default())
    }

    pub fn with_config(config: &BatchConfig) -> Self {
        Self {
            valid_entity_types: config.valid_entity_types.clone(),
        }
    }

    /// Whether a semantic tag is exported (exact match)
    pub fn is_valid_type(&self, semantic: &str) -> bool {
        self.valid_entity_types.iter().any(|t| t == semantic)
    }

    /// Records for every document, in caller order
    pub fn aggregate(&self, documents: &[BatchDocument]) -> Vec<WorkbookRecord> {
        let mut records = Vec::new();

        for document in documents {
            let Some(entities) = entity_list(&document.payload) else {
                tracing::warn!(file = %document.file_name, "Document has no entity list, skipping");
                continue;
            };

            let before = records.len();
            records.extend(self.document_records(document, entities));
            tracing::debug!(
                file = %document.file_name,
                records = records.len() - before,
                "Document aggregated"
            );
        }

        tracing::info!(
            documents = documents.len(),
            records = records.len(),
            "Batch aggregated"
        );

        records
    }

    /// `(file name, content)` per document, in caller order
    pub fn document_notes(&self, documents: &[BatchDocument]) -> Vec<(String, String)> {
        documents
            .iter()
            .map(|d| (d.file_name.clone(), d.content()))
            .collect()
    }

    fn document_records(&self, document: &BatchDocument, entities: &[Value]) -> Vec<WorkbookRecord> {
        let sentences = document
            .payload
            .get("sentences")
            .and_then(Value::as_array)
            .filter(|s| !s.is_empty());

        entities
            .iter()
            .map(RawEntity::from)
            .filter(|raw| self.is_valid_type(&raw.semantic))
            .map(|raw| {
                let context = match sentences {
                    Some(sentences) => sentence_context(raw.begin, raw.end, sentences),
                    None => raw.explanation.clone().unwrap_or_default(),
                };
                build_record(document, &raw, context)
            })
            .collect()
    }
}

impl Default for BatchAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn build_record(document: &BatchDocument, raw: &RawEntity, context: String) -> WorkbookRecord {
    let imo = raw.codemaps.imo();
    let code = |system: CodingSystem| {
        codemap::project_codemaps(&raw.codemaps, system)
            .code
            .trim()
            .to_string()
    };

    WorkbookRecord {
        hospital_guid: document.hospital_guid.clone(),
        encounter_guid: document.encounter_guid.clone(),
        patient_guid: document.patient_guid.clone(),
        file_name: document.file_name.clone(),
        run_time: document.run_time.clone(),
        context,
        section: raw.section.clone().unwrap_or_default(),
        text: raw.text.clone(),
        begin: raw.begin,
        end: raw.end,
        complete_entity: complete_entity(&raw.text, raw.begin, &raw.linked_entities),
        semantic_tag: raw.semantic.clone(),
        semantic_category: raw.semantic_category.clone().unwrap_or_default(),
        assertion: raw.assertion.clone(),
        lexical_code: imo.lexical_code,
        lexical_title: imo.lexical_title,
        default_lexical_code: imo.default_lexical_code,
        default_lexical_title: imo.default_lexical_title,
        confidence: raw
            .codemaps
            .get("imo")
            .and_then(|imo| value::opt_f64_at(imo, "confidence")),
        icd10cm: code(CodingSystem::Icd10Cm),
        snomed_international: code(CodingSystem::SnomedInternational),
        cpt: code(CodingSystem::Cpt),
        loinc: code(CodingSystem::Loinc),
        rxnorm: code(CodingSystem::RxNorm),
    }
}
