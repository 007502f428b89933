//! Keyword metadata: spinal procedure terms and financial figures.
//!
//! Tagging is a pure function of the text, so tagging the same text twice
//! gives identical results.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Procedure vocabulary, in reporting order.
pub const PROCEDURES: &[&str] = &[
    "fusion",
    "discectomy",
    "laminectomy",
    "foraminotomy",
    "cervical",
    "lumbar",
    "thoracic",
    "ACDF",
    "TLIF",
    "PLIF",
    "ALIF",
    "disc replacement",
    "navigation",
    "robotic surgery",
];

/// Dollar amounts, growth percentages and CAGR figures, in that order.
static FINANCIAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\$[0-9]+(?:\.[0-9]+)?\s*(?:million|billion|M|B)",
        r"(?i)[0-9]+(?:\.[0-9]+)?%\s*(?:growth|increase|decrease)",
        r"(?i)CAGR\s*(?:of\s*)?[0-9]+(?:\.[0-9]+)?%",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// What [`tag`] found in a text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Vocabulary terms present in the text, vocabulary order, no repeats.
    pub procedures: Vec<String>,
    /// Every match of every pattern; pattern order, then position. Repeats kept.
    pub financial: Vec<String>,
}

pub fn tag(text: &str) -> Metadata {
    Metadata {
        procedures: procedures(text),
        financial: financial_mentions(text),
    }
}

pub fn procedures(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    PROCEDURES
        .iter()
        .filter(|term| lower.contains(&term.to_lowercase()))
        .map(|term| term.to_string())
        .collect()
}

/// Patterns are applied independently; one span may match more than one.
pub fn financial_mentions(text: &str) -> Vec<String> {
    FINANCIAL
        .iter()
        .flat_map(|pattern| pattern.find_iter(text).map(|m| m.as_str().to_string()))
        .collect()
}
