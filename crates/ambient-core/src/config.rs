//! Ambient Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults matching the terminology service's conventions.
//! Credentials are not part of this configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Category;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Text-generation settings
    pub llm: LlmConfig,

    /// Entity classification settings
    pub extraction: ExtractionConfig,

    /// Cohort batch settings
    pub batch: BatchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(window) = std::env::var("CONTEXT_WINDOW") {
            config.extraction.context_window =
                window.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "CONTEXT_WINDOW".to_string(),
                    value: window,
                })?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            config.logging.json_format = parse_bool("LOG_JSON", &json)?;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Only override if env values differ from defaults
        if env_config.llm.model != LlmConfig::default().model {
            self.llm.model = env_config.llm.model;
        }
        if env_config.extraction.context_window != ExtractionConfig::default().context_window {
            self.extraction.context_window = env_config.extraction.context_window;
        }
        if env_config.logging.level != LoggingConfig::default().level {
            self.logging.level = env_config.logging.level;
        }
        if env_config.logging.json_format {
            self.logging.json_format = true;
        }

        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Text-generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier recorded in note provenance
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Nucleus sampling cutoff
    pub top_p: f32,

    /// System prompt sent with every note request
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "us.amazon.nova-pro-v1:0".to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            top_p: 0.9,
            system_prompt: "I am an expert SOAP note generator. Given a medical transcript of \
                            inpatient or outpatient visits I can create a SOAP note."
                .to_string(),
        }
    }
}

/// Keyword group mapping semantic labels onto one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl CategoryKeywords {
    fn new(category: Category, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Entity classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Characters of context on each side of a span
    pub context_window: usize,

    /// Substrings marking administrative/generic entity text
    pub ignore_patterns: Vec<String>,

    /// Ordered keyword groups; the first group with a hit wins
    pub category_keywords: Vec<CategoryKeywords>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            context_window: 200,
            ignore_patterns: [
                "review test results",
                "patient education",
                "lifestyle",
                "education",
                "review",
                "follow-up",
                "follow up",
                "appointment",
                "monitoring",
                "discussion",
                "counseling",
                "instructions",
                "recommendations",
                "assessment",
                "plan",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            category_keywords: vec![
                CategoryKeywords::new(Category::Problem, &["problem", "condition", "diagnosis"]),
                CategoryKeywords::new(Category::Procedure, &["procedure"]),
                CategoryKeywords::new(Category::Medication, &["medication", "drug"]),
                CategoryKeywords::new(Category::Lab, &["lab", "observation", "test"]),
            ],
        }
    }
}

/// Cohort batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Semantic tags kept in the workbook (exact match)
    pub valid_entity_types: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            valid_entity_types: [
                "problem",
                "drug",
                "test",
                "treatment",
                "imo_procedure",
                "procedure",
                "medication",
                "lab",
                "clinical_observation",
                "social_factor",
                "age group",
                "gender",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
