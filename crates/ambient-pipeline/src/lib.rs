//! Ambient Pipeline - Transcript to coded clinical entities
//!
//! Every request gets its own [`PipelineContext`]; nothing is shared
//! between requests except the immutable stage components held by
//! [`ClinicalPipeline`].
//!
//! Stages:
//! 1. SOAP note generation (with rule-based fallback)
//! 2. Entity extraction on the formatted note
//! 3. Classification into problems, procedures, medications and labs
//! 4. Per-entity normalization to standard coding systems

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ambient_core::{
    AppConfig, CategorizedEntities, CodedEntity, EntityExtractionService, NormalizationService,
    Result, SoapNote,
};
use ambient_extractor::{DroppedEntity, ExtractionParser, NormalizationDriver};
use ambient_soap::SoapGenerator;

// ============================================================================
// Request Context
// ============================================================================

/// Wall-clock time spent per stage, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub generation_ms: u64,
    pub extraction_ms: u64,
    pub normalization_ms: u64,
    pub total_ms: u64,
}

/// Everything produced while processing one transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineContext {
    pub request_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub transcript: String,
    pub note: SoapNote,

    /// Formatted note as sent to the extraction service
    pub note_text: String,

    pub entities: CategorizedEntities,
    pub dropped: Vec<DroppedEntity>,
    pub coded: CategorizedEntities<CodedEntity>,
    pub timings: StageTimings,
}

// ============================================================================
// Pipeline
// ============================================================================

/// End-to-end clinical note pipeline
#[derive(Clone)]
pub struct ClinicalPipeline {
    soap: SoapGenerator,
    extraction: Arc<dyn EntityExtractionService>,
    parser: ExtractionParser,
    normalizer: Option<NormalizationDriver>,
}

impl ClinicalPipeline {
    /// Create a pipeline without normalization
    pub fn new(soap: SoapGenerator, extraction: Arc<dyn EntityExtractionService>) -> Self {
        Self {
            soap,
            extraction,
            parser: ExtractionParser::new(),
            normalizer: None,
        }
    }

    /// Normalize classified entities through this service
    pub fn with_normalization(mut self, service: Arc<dyn NormalizationService>) -> Self {
        self.normalizer = Some(NormalizationDriver::new(service));
        self
    }

    /// Apply generation and classification settings
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.soap = self.soap.with_config(config.llm.clone());
        self.parser = ExtractionParser::with_config(&config.extraction);
        self
    }

    /// Process one transcript
    pub async fn run(&self, transcript: &str) -> Result<PipelineContext> {
        let request_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = Instant::now();
        let mut timings = StageTimings::default();

        tracing::info!(%request_id, "Pipeline started");

        let stage = Instant::now();
        let note = self.soap.generate(transcript).await?;
        let note_text = note.formatted();
        timings.generation_ms = elapsed_ms(stage);

        let stage = Instant::now();
        let response = self.extraction.extract(&note_text).await.map_err(|e| {
            tracing::error!(%request_id, error = %e, "Entity extraction failed");
            e
        })?;
        let outcome = self.parser.parse_with_audit(&response, &note_text);
        timings.extraction_ms = elapsed_ms(stage);

        let stage = Instant::now();
        let coded = match &self.normalizer {
            Some(driver) => driver.normalize_all(outcome.entities.clone()).await,
            None => uncoded(&outcome.entities),
        };
        timings.normalization_ms = elapsed_ms(stage);
        timings.total_ms = elapsed_ms(total);

        tracing::info!(
            %request_id,
            entities = outcome.entities.total(),
            dropped = outcome.dropped.len(),
            total_ms = timings.total_ms,
            "Pipeline complete"
        );

        Ok(PipelineContext {
            request_id,
            started_at,
            transcript: transcript.trim().to_string(),
            note,
            note_text,
            entities: outcome.entities,
            dropped: outcome.dropped,
            coded,
            timings,
        })
    }
}

fn uncoded(entities: &CategorizedEntities) -> CategorizedEntities<CodedEntity> {
    let mut coded = CategorizedEntities::new();
    for (category, list) in entities.clone().into_lists() {
        for entity in list {
            coded.push(category, CodedEntity::uncoded(entity));
        }
    }
    coded
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ============================================================================
// Tests
// ============================================================================
