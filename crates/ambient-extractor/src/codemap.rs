//! Code-mapping projection
//!
//! Pulls the best-match code and title for each standard coding system out
//! of a normalization response (or an entity's own `codemaps`). RxNorm
//! stores its fields under different names than every other system; that
//! asymmetry lives in one rule table instead of scattered branches.

use std::collections::BTreeMap;

use serde_json::Value;

use ambient_core::{value, Category, CodeMaps, CodePair, CodingSystem};

// ============================================================================
// Rule Table
// ============================================================================

/// Where a code entry keeps its title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRule {
    /// Plain field on the code entry
    Field(&'static str),
    /// Field of the first element of a list on the code entry
    FirstOfList {
        list: &'static str,
        field: &'static str,
    },
}

/// Field layout of one coding system's code entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRule {
    pub code_field: &'static str,
    pub title: TitleRule,
}

const STANDARD_RULE: CodeRule = CodeRule {
    code_field: "code",
    title: TitleRule::Field("title"),
};

const RXNORM_RULE: CodeRule = CodeRule {
    code_field: "rxnorm_code",
    title: TitleRule::FirstOfList {
        list: "rxnorm_titles",
        field: "title",
    },
};

/// Extraction rule for a coding system
pub fn rule(system: CodingSystem) -> CodeRule {
    match system {
        CodingSystem::RxNorm => RXNORM_RULE,
        CodingSystem::Icd10Cm
        | CodingSystem::SnomedInternational
        | CodingSystem::Cpt
        | CodingSystem::Icd10Pcs
        | CodingSystem::Loinc => STANDARD_RULE,
    }
}

impl CodeRule {
    /// Read code and title from a single code entry
    pub fn apply(&self, entry: &Value) -> CodePair {
        let title = match self.title {
            TitleRule::Field(field) => value::string_at(entry, field),
            TitleRule::FirstOfList { list, field } => entry
                .get(list)
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .map(|first| value::string_at(first, field))
                .unwrap_or_default(),
        };

        CodePair {
            code: value::string_at(entry, self.code_field),
            title,
        }
    }
}

// ============================================================================
// Projection
// ============================================================================

/// `requests[0].response.items[0].metadata.mappings` of a normalization response
pub fn best_match_mappings(response: &Value) -> Option<&Value> {
    response
        .get("requests")?
        .as_array()?
        .first()?
        .get("response")?
        .get("items")?
        .as_array()?
        .first()?
        .get("metadata")?
        .get("mappings")
}

/// Project one system's block (`{codes: [...]}`); the first entry is taken
pub fn project_block(block: &Value, system: CodingSystem) -> CodePair {
    block
        .get("codes")
        .and_then(Value::as_array)
        .and_then(|codes| codes.first())
        .map(|entry| rule(system).apply(entry))
        .unwrap_or_default()
}

/// Project one system out of a `mappings` object
pub fn project_system(mappings: &Value, system: CodingSystem) -> CodePair {
    mappings
        .get(system.mapping_key())
        .map(|block| project_block(block, system))
        .unwrap_or_default()
}

/// Project every coding system of the category out of a normalization
/// response. Each system is present in the result; missing steps yield
/// empty strings.
pub fn project(response: &Value, category: Category) -> BTreeMap<CodingSystem, CodePair> {
    let mappings = best_match_mappings(response);

    category
        .coding_systems()
        .iter()
        .map(|&system| {
            let pair = mappings
                .map(|m| project_system(m, system))
                .unwrap_or_default();
            (system, pair)
        })
        .collect()
}

/// Project a system out of an entity's own code maps
pub fn project_codemaps(codemaps: &CodeMaps, system: CodingSystem) -> CodePair {
    codemaps
        .get(system.mapping_key())
        .map(|block| project_block(block, system))
        .unwrap_or_default()
}
