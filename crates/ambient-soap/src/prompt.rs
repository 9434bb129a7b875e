//! Prompt construction for SOAP note generation

use ambient_core::SoapSection;

const REQUEST: &str =
    "Please generate a comprehensive SOAP note from the following medical transcript.";

const CLOSING: &str =
    "Please provide the SOAP note in clear, well-formatted text suitable for clinical documentation.";

/// What the model is asked to put in each section
pub fn section_guidance(section: SoapSection) -> &'static str {
    match section {
        SoapSection::Subjective => {
            "Patient's reported symptoms, history, and concerns - use paragraphs and bullet points as appropriate"
        }
        SoapSection::Objective => {
            "Physical examination findings, vital signs, and test results - use structured format with clear organization"
        }
        SoapSection::Assessment => {
            "Clinical diagnosis and evaluation - use numbered list for multiple diagnoses"
        }
        SoapSection::Plan => "Treatment plan and recommendations - use numbered or bulleted list",
    }
}

/// Builder for SOAP generation prompts
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    system_instruction: String,
    transcript: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Set the transcript to summarize
    pub fn transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    /// Build the final prompt
    pub fn build(self) -> String {
        let mut prompt = String::new();

        if !self.system_instruction.is_empty() {
            prompt.push_str(&self.system_instruction);
            prompt.push_str("\n\n");
        }

        prompt.push_str(REQUEST);
        prompt.push_str("\n\nFormat your response as follows:\n\n");

        for section in SoapSection::ALL {
            prompt.push_str(&format!(
                "{}:\n[{}]\n\n",
                section.header(),
                section_guidance(section)
            ));
        }

        prompt.push_str("Medical Transcript:\n");
        prompt.push_str(&self.transcript);
        prompt.push_str("\n\n");
        prompt.push_str(CLOSING);

        prompt
    }
}
