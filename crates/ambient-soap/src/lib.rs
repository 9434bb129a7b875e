//! Ambient SOAP - Structured note recovery and generation
//!
//! Turns free-form model output into the four SOAP sections. Recovery runs
//! in two phases:
//! - a structured boundary scan over `SUBJECTIVE` / `OBJECTIVE` /
//!   `ASSESSMENT` / `PLAN` headers ([`sections::scan_sections`])
//! - a keyword-scored sentence classifier used only when the scan finds
//!   nothing ([`fallback::classify_sentences`])
//!
//! [`SoapGenerator`] wraps a [`TextGenerator`] around both phases and falls
//! back to rule-based sections when generation is unavailable.

use std::sync::Arc;
use std::time::Instant;

use ambient_core::{
    AmbientError, LlmConfig, NoteSource, Result, SoapNote, SoapSections, TextGenerator,
};

pub mod fallback;
pub mod prompt;
pub mod sections;

pub use fallback::classify_sentences;
pub use prompt::PromptBuilder;
pub use sections::scan_sections;

// ============================================================================
// Section Recovery
// ============================================================================

/// Recover the four sections from generated text. Never fails; any
/// section without content is an empty string.
pub fn recover_sections(text: &str) -> SoapSections {
    let framed = sections::strip_frame(text);
    let scanned = scan_sections(&framed);

    if !scanned.is_empty() {
        return scanned;
    }

    tracing::debug!("No section headers found, classifying sentences");
    classify_sentences(&framed)
}

// ============================================================================
// Note Generation
// ============================================================================

/// Produces SOAP notes from transcripts
#[derive(Clone)]
pub struct SoapGenerator {
    generator: Option<Arc<dyn TextGenerator>>,
    config: LlmConfig,
}

impl SoapGenerator {
    /// Create a generator backed by a text-generation model
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            config: LlmConfig::default(),
        }
    }

    /// Create a generator that only uses the keyword classifier
    pub fn rule_based() -> Self {
        Self {
            generator: None,
            config: LlmConfig::default(),
        }
    }

    /// Set the generation configuration
    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Prompt sent to the model for a transcript
    pub fn prompt(&self, transcript: &str) -> String {
        PromptBuilder::new()
            .system(self.config.system_prompt.as_str())
            .transcript(transcript)
            .build()
    }

    /// Generate a note for a transcript
    pub async fn generate(&self, transcript: &str) -> Result<SoapNote> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(AmbientError::Validation(
                "Transcript cannot be empty".to_string(),
            ));
        }

        if let Some(generator) = &self.generator {
            match self.generate_with(generator.as_ref(), transcript).await {
                Ok(note) => return Ok(note),
                Err(e) => {
                    tracing::warn!(error = %e, "Generation failed, falling back to rule-based note");
                }
            }
        }

        let sections = classify_sentences(transcript);
        tracing::info!("Rule-based SOAP note created");
        Ok(SoapNote::new(sections, NoteSource::RuleBased, None))
    }

    async fn generate_with(&self, generator: &dyn TextGenerator, transcript: &str) -> Result<SoapNote> {
        let start = Instant::now();
        let prompt = self.prompt(transcript);

        tracing::info!(
            model = generator.model_id(),
            transcript_chars = transcript.chars().count(),
            "Generating SOAP note"
        );

        let output = generator.generate(&prompt).await?;
        let sections = recover_sections(&output);

        if sections.is_empty() {
            return Err(AmbientError::Generation(
                "model output contained no note text".to_string(),
            ));
        }

        tracing::info!(
            output_chars = output.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "SOAP note generated"
        );

        Ok(SoapNote::new(
            sections,
            NoteSource::Generated,
            Some(generator.model_id().to_string()),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
