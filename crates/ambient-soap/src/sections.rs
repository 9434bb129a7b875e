//! Structured section scan
//!
//! Recovers SOAP section bodies from header-delimited text. Each section
//! has a header matcher and a terminator matcher; the body runs from the
//! end of the header to the first terminator at or after it, or to the end
//! of the text. Every pattern runs on the `regex` crate's finite automata,
//! so matching stays linear in the input.

use once_cell::sync::Lazy;
use regex::Regex;

use ambient_core::{SoapSection, SoapSections};

// ============================================================================
// Patterns
// ============================================================================

/// First subjective header, bold or plain
static PREAMBLE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*SUBJECTIVE|\bSUBJECTIVE:").expect("valid preamble regex"));

/// Rule followed by the generator's closing remark, through end of text
static FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)---\s*This SOAP note.*").expect("valid footer regex"));

static TRAILING_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"---\s*\z").expect("valid trailing rule regex"));

/// Emphasis and inline-code markers, applied in order
static MARKDOWN_SPANS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\*\*\*(.+?)\*\*\*",
        r"\*\*(.+?)\*\*",
        r"\*(.+?)\*",
        r"___(.+?)___",
        r"__(.+?)__",
        r"_(.+?)_",
        r"`(.+?)`",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid markdown regex"))
    .collect()
});

static HEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid heading regex"));

static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

static LEADING_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A-+\s*").expect("valid leading rule regex"));

static TRAILING_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*-+\z").expect("valid trailing fragment regex"));

// ============================================================================
// Section Matchers
// ============================================================================

/// Header and terminator patterns for one section
struct SectionMatcher {
    section: SoapSection,
    header: Regex,
    terminator: Regex,
}

impl SectionMatcher {
    /// `following` lists the headers that may end this section's body
    fn new(section: SoapSection, following: &[SoapSection]) -> Self {
        let header = format!(r"(?i)(?:\*\*)?{}:?(?:\*\*)?\s*\n+", section.header());

        let terminator = if following.is_empty() {
            r"(?i)---|This SOAP note".to_string()
        } else {
            let names: Vec<&str> = following.iter().map(SoapSection::header).collect();
            format!(r"(?i)\n\s*(?:\*\*)?(?:{}):|---", names.join("|"))
        };

        Self {
            section,
            header: Regex::new(&header).expect("valid section header regex"),
            terminator: Regex::new(&terminator).expect("valid section terminator regex"),
        }
    }

    /// Raw body of this section, if its header occurs
    fn body<'t>(&self, text: &'t str) -> Option<&'t str> {
        let start = self.header.find(text)?.end();
        let end = self
            .terminator
            .find_at(text, start)
            .map(|m| m.start())
            .unwrap_or(text.len());
        Some(&text[start..end])
    }
}

static MATCHERS: Lazy<Vec<SectionMatcher>> = Lazy::new(|| {
    SoapSection::ALL
        .iter()
        .enumerate()
        .map(|(i, &section)| SectionMatcher::new(section, &SoapSection::ALL[i + 1..]))
        .collect()
});

// ============================================================================
// Operations
// ============================================================================

/// Drop the preamble before the first subjective header and any closing
/// footer after a `---` rule
pub fn strip_frame(text: &str) -> String {
    let start = PREAMBLE_END.find(text).map(|m| m.start()).unwrap_or(0);
    let text = FOOTER.replace(&text[start..], "");
    TRAILING_RULE.replace(&text, "").into_owned()
}

/// Remove emphasis, inline-code and heading markers, keeping the text
pub fn clean_markdown(text: &str) -> String {
    let mut text = text.to_string();
    for pattern in MARKDOWN_SPANS.iter() {
        text = pattern.replace_all(&text, "$1").into_owned();
    }
    HEADING_MARKER.replace_all(&text, "").into_owned()
}

/// Tidy one section body: markdown, blank-line runs and rule fragments
pub fn clean_body(body: &str) -> String {
    let text = clean_markdown(body.trim());
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = LEADING_RULE.replace(&text, "");
    let text = TRAILING_FRAGMENT.replace(&text, "");
    text.trim().to_string()
}

/// Structured boundary scan. Sections whose header does not occur stay empty.
pub fn scan_sections(text: &str) -> SoapSections {
    let mut sections = SoapSections::default();

    for matcher in MATCHERS.iter() {
        if let Some(body) = matcher.body(text) {
            sections.set(matcher.section, clean_body(body));
        }
    }

    sections
}
