//! Response parsing for grade suggestions
//!
//! The service replies with a candidate envelope whose first candidate text
//! must itself be JSON. Only an absent or unparseable candidate fails the
//! request; field-level gaps substitute the sentinel defaults instead.

use serde::Deserialize;
use serde_json::Value;

use super::{SuggestError, SuggestionResult, FEEDBACK_UNAVAILABLE, GRADE_UNAVAILABLE};

/// Envelope returned by generateContent. Only the candidate-text path is
/// interesting; unknown fields are tolerated and ignored.
#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Pull the first candidate's text out of the raw reply body.
/// An undecodable envelope, no candidates, no parts, and empty text all
/// collapse to None; the caller treats them identically.
fn extract_candidate_text(raw: &str) -> Option<String> {
    let envelope: GenerateContentResponse = serde_json::from_str(raw).ok()?;
    envelope
        .candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .next()?
        .text
        .filter(|text| !text.is_empty())
}

/// Substitute defaults for any field that is missing, non-string, or empty
fn suggestion_from_value(value: &Value) -> SuggestionResult {
    let grade = value
        .get("grade")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(GRADE_UNAVAILABLE);
    let feedback = value
        .get("feedback")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FEEDBACK_UNAVAILABLE);
    SuggestionResult::new(grade, feedback)
}

/// Parse a successful transport reply into a suggestion.
///
/// Fails only when no candidate text is present or the text is not JSON;
/// a parsed value with missing fields still succeeds with defaults.
pub fn parse_reply(raw: &str) -> Result<SuggestionResult, SuggestError> {
    let text = extract_candidate_text(raw).ok_or(SuggestError::MissingCandidateText)?;
    let value: Value = serde_json::from_str(&text).map_err(SuggestError::MalformedSuggestion)?;
    Ok(suggestion_from_value(&value))
}
