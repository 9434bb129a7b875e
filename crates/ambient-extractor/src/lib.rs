//! Ambient Extractor - Clinical entity extraction pipeline
//!
//! Turns terminology-service responses into categorized, coded clinical
//! entities: span context, classification and filtering, response parsing,
//! code-map projection, per-entity normalization and cohort aggregation.

pub mod batch;
pub mod classify;
pub mod codemap;
pub mod context;
pub mod normalize;
pub mod parse;

pub use batch::{BatchAggregator, BatchDocument, WorkbookRecord, WORKBOOK_COLUMNS};
pub use classify::{DropReason, EntityClassifier, Verdict};
pub use codemap::project;
pub use context::extract_context;
pub use normalize::NormalizationDriver;
pub use parse::{DroppedEntity, ExtractionParser, ParseOutcome};
