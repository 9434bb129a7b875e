//! Ambient Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the pipeline:
//! - Terminology-service entity records (raw, classified, coded)
//! - Clinical categories and standard coding systems
//! - SOAP note sections and provenance
//! - Common error types
//! - Traits for the external text-generation, extraction and
//!   normalization services
//! - Configuration management

pub mod config;
pub mod value;

pub use config::{
    AppConfig, BatchConfig, CategoryKeywords, ConfigError, ExtractionConfig, LlmConfig,
    LoggingConfig,
};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for pipeline operations
#[derive(Error, Debug)]
pub enum AmbientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AmbientError>;

// ============================================================================
// Categories and Coding Systems
// ============================================================================

/// Output category of a retained clinical entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Problem,
    Procedure,
    Medication,
    Lab,
}

impl Category {
    /// All categories in output order
    pub const ALL: [Category; 4] = [
        Category::Problem,
        Category::Procedure,
        Category::Medication,
        Category::Lab,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Problem => "problem",
            Self::Procedure => "procedure",
            Self::Medication => "medication",
            Self::Lab => "lab",
        }
    }

    /// Domain name expected by the normalization service
    pub fn normalization_domain(&self) -> &'static str {
        match self {
            Self::Problem => "Problem",
            Self::Procedure => "Procedure",
            Self::Medication => "Medication",
            Self::Lab => "Lab",
        }
    }

    /// Prefix of the client request id sent with a normalization call
    pub fn request_prefix(&self) -> &'static str {
        match self {
            Self::Problem => "normalize_",
            Self::Procedure => "normalize_proc_",
            Self::Medication => "normalize_med_",
            Self::Lab => "normalize_lab_",
        }
    }

    /// Standard coding systems projected for this category
    pub fn coding_systems(&self) -> &'static [CodingSystem] {
        match self {
            Self::Problem => &[CodingSystem::Icd10Cm, CodingSystem::SnomedInternational],
            Self::Procedure => &[CodingSystem::Cpt, CodingSystem::Icd10Pcs],
            Self::Medication => &[CodingSystem::RxNorm],
            Self::Lab => &[CodingSystem::Loinc],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = AmbientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "problem" | "problems" => Ok(Self::Problem),
            "procedure" | "procedures" => Ok(Self::Procedure),
            "medication" | "medications" => Ok(Self::Medication),
            "lab" | "labs" => Ok(Self::Lab),
            other => Err(AmbientError::Validation(format!(
                "unknown category: {other}"
            ))),
        }
    }
}

/// Standard vocabularies the normalization service maps into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CodingSystem {
    #[serde(rename = "icd10cm")]
    Icd10Cm,
    #[serde(rename = "snomedInternational")]
    SnomedInternational,
    #[serde(rename = "cpt")]
    Cpt,
    #[serde(rename = "icd10pcs")]
    Icd10Pcs,
    #[serde(rename = "rxnorm")]
    RxNorm,
    #[serde(rename = "loinc")]
    Loinc,
}

impl CodingSystem {
    pub const ALL: [CodingSystem; 6] = [
        CodingSystem::Icd10Cm,
        CodingSystem::SnomedInternational,
        CodingSystem::Cpt,
        CodingSystem::Icd10Pcs,
        CodingSystem::RxNorm,
        CodingSystem::Loinc,
    ];

    /// Key of this system in a `mappings` / `codemaps` object
    pub fn mapping_key(&self) -> &'static str {
        match self {
            Self::Icd10Cm => "icd10cm",
            Self::SnomedInternational => "snomedInternational",
            Self::Cpt => "cpt",
            Self::Icd10Pcs => "icd10pcs",
            Self::RxNorm => "rxnorm",
            Self::Loinc => "loinc",
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Icd10Cm => "ICD-10-CM",
            Self::SnomedInternational => "SNOMED International",
            Self::Cpt => "CPT",
            Self::Icd10Pcs => "ICD-10-PCS",
            Self::RxNorm => "RxNorm",
            Self::Loinc => "LOINC",
        }
    }
}

impl std::fmt::Display for CodingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Terminology Service Entities
// ============================================================================

/// Code-map structure attached to an entity, keyed by coding-system name.
///
/// Kept opaque: only `imo` is read during classification, the standard
/// systems are read later by the code-mapping projector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeMaps(pub Map<String, Value>);

impl CodeMaps {
    /// Look up one coding system's block
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The terminology service's own lexical mapping
    pub fn imo(&self) -> ImoLexical {
        self.get("imo").map(ImoLexical::from).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lexical code block found under `codemaps.imo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImoLexical {
    pub lexical_code: String,
    pub lexical_title: String,
    pub default_lexical_code: String,
    pub default_lexical_title: String,
    pub confidence: f64,
}

impl From<&Value> for ImoLexical {
    fn from(imo: &Value) -> Self {
        Self {
            lexical_code: value::string_at(imo, "lexical_code"),
            lexical_title: value::string_at(imo, "lexical_title"),
            default_lexical_code: value::string_at(imo, "default_lexical_code"),
            default_lexical_title: value::string_at(imo, "default_lexical_title"),
            confidence: value::f64_at(imo, "confidence"),
        }
    }
}

/// Secondary span of a multi-span composite mention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedEntity {
    /// Identifier, prefixed with the span's begin offset (`"<begin>_..."`)
    pub id: String,
    pub text: String,
}

/// One entity record as returned by the terminology service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub id: String,
    pub text: String,
    pub begin: i64,
    pub end: i64,
    pub assertion: String,
    pub semantic: String,
    pub codemaps: CodeMaps,
    pub linked_entities: Vec<LinkedEntity>,
    pub section: Option<String>,
    pub semantic_category: Option<String>,
    pub explanation: Option<String>,
}

impl RawEntity {
    /// Span length in characters (may be negative for malformed spans)
    pub fn length(&self) -> i64 {
        self.end.saturating_sub(self.begin)
    }
}

/// Lenient lift from service JSON: every missing or mistyped field
/// falls back to its empty/zero default.
impl From<&Value> for RawEntity {
    fn from(entity: &Value) -> Self {
        let codemaps = entity
            .get("codemaps")
            .and_then(Value::as_object)
            .cloned()
            .map(CodeMaps)
            .unwrap_or_default();

        let linked_entities = entity
            .get("linked_entities")
            .and_then(Value::as_array)
            .map(|links| {
                links
                    .iter()
                    .map(|link| LinkedEntity {
                        id: value::string_at(link, "id"),
                        text: value::string_at(link, "text"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: value::string_at(entity, "id"),
            text: value::string_at(entity, "text"),
            begin: value::i64_at(entity, "begin"),
            end: value::i64_at(entity, "end"),
            assertion: value::string_at(entity, "assertion"),
            semantic: value::string_at(entity, "semantic"),
            codemaps,
            linked_entities,
            section: value::opt_string_at(entity, "section"),
            semantic_category: value::opt_string_at(entity, "semantic_category"),
            explanation: value::opt_string_at(entity, "explanation"),
        }
    }
}

/// An entity that passed the classifier's filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEntity {
    pub text: String,

    /// Terminology-service lexical code
    pub code: String,

    /// Always `"IMO"` for the raw lexical code
    pub code_system: String,

    pub description: String,

    /// Character offset of the span
    pub offset: i64,

    /// Span length in characters
    pub length: i64,

    pub confidence: f64,

    /// Bounded text window around the span
    pub context: String,

    pub entity_id: String,
    pub semantic: String,
    pub assertion: String,

    /// Carried through for later projection
    pub codemaps: CodeMaps,
}

/// Code and title for one coding system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePair {
    pub code: String,
    pub title: String,
}

impl CodePair {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.title.is_empty()
    }
}

/// A classified entity enriched with standard codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedEntity {
    #[serde(flatten)]
    pub entity: ClassifiedEntity,

    /// Empty when normalization was skipped or failed
    pub codes: BTreeMap<CodingSystem, CodePair>,
}

impl CodedEntity {
    /// Wrap an entity without any standard codes
    pub fn uncoded(entity: ClassifiedEntity) -> Self {
        Self {
            entity,
            codes: BTreeMap::new(),
        }
    }

    /// Code for a system, empty when absent
    pub fn code(&self, system: CodingSystem) -> &str {
        self.codes
            .get(&system)
            .map(|pair| pair.code.as_str())
            .unwrap_or("")
    }

    /// Title for a system, empty when absent
    pub fn title(&self, system: CodingSystem) -> &str {
        self.codes
            .get(&system)
            .map(|pair| pair.title.as_str())
            .unwrap_or("")
    }

    /// Whether a normalization response was applied
    pub fn is_normalized(&self) -> bool {
        !self.codes.is_empty()
    }
}

/// Per-category entity lists, each in source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedEntities<T = ClassifiedEntity> {
    pub problems: Vec<T>,
    pub procedures: Vec<T>,
    pub medications: Vec<T>,
    pub labs: Vec<T>,
}

impl<T> Default for CategorizedEntities<T> {
    fn default() -> Self {
        Self {
            problems: Vec::new(),
            procedures: Vec::new(),
            medications: Vec::new(),
            labs: Vec::new(),
        }
    }
}

impl<T> CategorizedEntities<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> &[T] {
        match category {
            Category::Problem => &self.problems,
            Category::Procedure => &self.procedures,
            Category::Medication => &self.medications,
            Category::Lab => &self.labs,
        }
    }

    /// Append to the end of a category list
    pub fn push(&mut self, category: Category, item: T) {
        match category {
            Category::Problem => self.problems.push(item),
            Category::Procedure => self.procedures.push(item),
            Category::Medication => self.medications.push(item),
            Category::Lab => self.labs.push(item),
        }
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            problems: self.problems.len(),
            procedures: self.procedures.len(),
            medications: self.medications.len(),
            labs: self.labs.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Consume into `(category, list)` pairs in output order
    pub fn into_lists(self) -> [(Category, Vec<T>); 4] {
        [
            (Category::Problem, self.problems),
            (Category::Procedure, self.procedures),
            (Category::Medication, self.medications),
            (Category::Lab, self.labs),
        ]
    }
}

/// Number of entities per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub problems: usize,
    pub procedures: usize,
    pub medications: usize,
    pub labs: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.problems + self.procedures + self.medications + self.labs
    }
}

// ============================================================================
// SOAP Notes
// ============================================================================

/// The four logical sections of a SOAP note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoapSection {
    Subjective,
    Objective,
    Assessment,
    Plan,
}

impl SoapSection {
    /// Sections in document order
    pub const ALL: [SoapSection; 4] = [
        SoapSection::Subjective,
        SoapSection::Objective,
        SoapSection::Assessment,
        SoapSection::Plan,
    ];

    /// Upper-case header text
    pub fn header(&self) -> &'static str {
        match self {
            Self::Subjective => "SUBJECTIVE",
            Self::Objective => "OBJECTIVE",
            Self::Assessment => "ASSESSMENT",
            Self::Plan => "PLAN",
        }
    }
}

/// Section bodies of a SOAP note, each possibly empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoapSections {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl SoapSections {
    pub fn get(&self, section: SoapSection) -> &str {
        match section {
            SoapSection::Subjective => &self.subjective,
            SoapSection::Objective => &self.objective,
            SoapSection::Assessment => &self.assessment,
            SoapSection::Plan => &self.plan,
        }
    }

    pub fn set(&mut self, section: SoapSection, body: String) {
        match section {
            SoapSection::Subjective => self.subjective = body,
            SoapSection::Objective => self.objective = body,
            SoapSection::Assessment => self.assessment = body,
            SoapSection::Plan => self.plan = body,
        }
    }

    /// True when no section has any content
    pub fn is_empty(&self) -> bool {
        SoapSection::ALL.iter().all(|s| self.get(*s).is_empty())
    }

    /// Render as `HEADER:` / body blocks, skipping empty sections
    pub fn formatted(&self) -> String {
        let mut lines = Vec::new();
        for section in SoapSection::ALL {
            let body = self.get(section);
            if body.is_empty() {
                continue;
            }
            lines.push(format!("\n{}:", section.header()));
            lines.push(body.to_string());
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

/// How a note's sections were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSource {
    /// Recovered from text-generation output
    Generated,
    /// Keyword classifier over the raw transcript
    RuleBased,
}

/// Provenance metadata stamped on a note at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteProvenance {
    pub source: NoteSource,
    pub generated_at: DateTime<Utc>,
    pub model: Option<String>,
}

/// A SOAP note created once per transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapNote {
    #[serde(flatten)]
    pub sections: SoapSections,

    pub provenance: NoteProvenance,
}

impl SoapNote {
    /// Create a note stamped with the current time
    pub fn new(sections: SoapSections, source: NoteSource, model: Option<String>) -> Self {
        Self {
            sections,
            provenance: NoteProvenance {
                source,
                generated_at: Utc::now(),
                model,
            },
        }
    }

    pub fn formatted(&self) -> String {
        self.sections.formatted()
    }
}

// ============================================================================
// Normalization Requests
// ============================================================================

/// Request body for the normalization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeRequest {
    pub client_request_id: String,
    pub requests: Vec<NormalizeRecord>,
}

/// One code to normalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeRecord {
    pub record_id: String,
    pub domain: String,
    pub input_code: String,
    pub input_code_system: String,
}

impl NormalizeRequest {
    /// Build the single-record request for one entity's lexical code
    pub fn for_code(code: &str, category: Category) -> Self {
        Self {
            client_request_id: format!("{}{}", category.request_prefix(), code),
            requests: vec![NormalizeRecord {
                record_id: code.to_string(),
                domain: category.normalization_domain().to_string(),
                input_code: code.to_string(),
                input_code_system: "IMO".to_string(),
            }],
        }
    }

    /// Build the request for an entity's lexical code
    pub fn for_entity(entity: &ClassifiedEntity, category: Category) -> Self {
        Self::for_code(&entity.code, category)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Text-generation model used to draft SOAP notes
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier recorded in note provenance
    fn model_id(&self) -> &str;
}

/// Terminology service performing entity extraction
#[async_trait::async_trait]
pub trait EntityExtractionService: Send + Sync {
    /// Extract entities; returns the raw response payload
    async fn extract(&self, text: &str) -> Result<Value>;
}

/// Terminology service mapping lexical codes to standard vocabularies
#[async_trait::async_trait]
pub trait NormalizationService: Send + Sync {
    /// Normalize; returns the raw response payload
    async fn normalize(&self, request: &NormalizeRequest) -> Result<Value>;
}

// ============================================================================
// Tests
// ============================================================================
