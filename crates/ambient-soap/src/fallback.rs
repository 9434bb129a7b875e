//! Keyword-scored sentence classifier
//!
//! Used when no section header can be found. Each sentence goes to the
//! section whose cue list it hits most often; ties resolve in document
//! order (subjective, objective, assessment, plan) and a sentence with no
//! hit at all goes to subjective.

use once_cell::sync::Lazy;
use regex::Regex;

use ambient_core::{SoapSection, SoapSections};

/// Terminal punctuation followed by whitespace
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence break regex"));

const SUBJECTIVE_CUES: &[&str] = &[
    "patient",
    "reports",
    "complains",
    "states",
    "presents with",
    "history",
    "symptoms",
    "pain",
    "discomfort",
    "feels",
    "feeling",
];

const OBJECTIVE_CUES: &[&str] = &[
    "exam",
    "vital signs",
    "blood pressure",
    "heart rate",
    "temperature",
    "respiratory rate",
    "physical exam",
    "labs",
    "imaging",
    "test results",
    "findings",
    "readings",
    "levels",
];

const ASSESSMENT_CUES: &[&str] = &[
    "diagnosis",
    "assessment",
    "impression",
    "condition",
    "problem",
    "given",
    "important",
];

const PLAN_CUES: &[&str] = &[
    "plan",
    "treatment",
    "prescribe",
    "medication",
    "follow-up",
    "referral",
    "admit",
    "discharge",
    "order",
    "continue",
    "administer",
    "monitor",
    "adjust",
    "review",
];

/// Cue substrings for a section
pub fn cues(section: SoapSection) -> &'static [&'static str] {
    match section {
        SoapSection::Subjective => SUBJECTIVE_CUES,
        SoapSection::Objective => OBJECTIVE_CUES,
        SoapSection::Assessment => ASSESSMENT_CUES,
        SoapSection::Plan => PLAN_CUES,
    }
}

/// Split after `.`, `!` or `?` followed by whitespace; the punctuation
/// stays with its sentence and blank pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_BREAK.find_iter(text) {
        // punctuation is a single byte
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Number of a section's cues contained in the sentence
pub fn score(sentence: &str, section: SoapSection) -> usize {
    let lower = sentence.to_lowercase();
    cues(section)
        .iter()
        .filter(|cue| lower.contains(*cue))
        .count()
}

/// Section a sentence is assigned to
pub fn best_section(sentence: &str) -> SoapSection {
    let mut best = SoapSection::Subjective;
    let mut best_score = 0;

    for section in SoapSection::ALL {
        let hits = score(sentence, section);
        if hits > best_score {
            best = section;
            best_score = hits;
        }
    }

    best
}

/// Assign every sentence to one section and join each group with a space
pub fn classify_sentences(text: &str) -> SoapSections {
    let mut groups: [Vec<&str>; 4] = Default::default();

    for sentence in split_sentences(text) {
        let index = match best_section(sentence) {
            SoapSection::Subjective => 0,
            SoapSection::Objective => 1,
            SoapSection::Assessment => 2,
            SoapSection::Plan => 3,
        };
        groups[index].push(sentence);
    }

    let mut sections = SoapSections::default();
    for (section, group) in SoapSection::ALL.into_iter().zip(groups) {
        sections.set(section, group.join(" "));
    }

    tracing::debug!(
        subjective = !sections.subjective.is_empty(),
        objective = !sections.objective.is_empty(),
        assessment = !sections.assessment.is_empty(),
        plan = !sections.plan.is_empty(),
        "Sentences classified by keyword"
    );

    sections
}
