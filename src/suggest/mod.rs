//! Grade-suggestion engine for gradepilot
//!
//! Asks a generative-AI endpoint to review a student submission against the
//! assignment question and propose a grade with short feedback. Delivery is
//! retried with exponential backoff, and every failure degrades to a
//! displayable default result instead of surfacing a raw error.

pub mod client;
pub mod parse;
pub mod payload;
pub mod task;

use serde::Serialize;
use thiserror::Error;

pub use client::{HttpTransport, SuggestionRequester, SuggestionTransport, TransportError};
pub use task::{spawn_suggestion, SuggestionHandle};

/// Grade shown when the service returns nothing usable
pub const GRADE_UNAVAILABLE: &str = "N/A";
/// Feedback shown when the service omits or blanks the feedback field
pub const FEEDBACK_UNAVAILABLE: &str = "AI could not generate detailed feedback.";

/// Feedback for replies that could not be parsed
const FORMAT_ERROR_FEEDBACK: &str = "AI response format error. Could not parse.";
/// Feedback when every delivery attempt failed
const DELIVERY_ERROR_FEEDBACK: &str =
    "Error connecting to AI assistant: delivery failed after retries.";

/// What the caller wants reviewed. Immutable once constructed; the caller is
/// responsible for only building requests with non-empty submission text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub question: String,
    pub submission_text: String,
}

impl SuggestionRequest {
    pub fn new(question: impl Into<String>, submission_text: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            submission_text: submission_text.into(),
        }
    }
}

/// A suggested grade and feedback message. Both fields are always present:
/// absent or malformed service output is substituted with the sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionResult {
    pub grade: String,
    pub feedback: String,
}

impl SuggestionResult {
    pub fn new(grade: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            grade: grade.into(),
            feedback: feedback.into(),
        }
    }
}

/// Lifecycle of one suggestion request. Starts Pending and settles exactly
/// once into Succeeded or Failed; a resubmission gets a fresh outcome rather
/// than mutating a settled one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RequestOutcome {
    Pending,
    Succeeded(SuggestionResult),
    Failed {
        reason: String,
        result: SuggestionResult,
    },
}

impl RequestOutcome {
    /// Whether the outcome has settled
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestOutcome::Pending)
    }

    /// The displayable result, if the outcome has settled.
    /// Failed outcomes still carry a result (the safe defaults).
    pub fn result(&self) -> Option<&SuggestionResult> {
        match self {
            RequestOutcome::Pending => None,
            RequestOutcome::Succeeded(result) => Some(result),
            RequestOutcome::Failed { result, .. } => Some(result),
        }
    }
}

/// Why a suggestion request failed. Each variant maps to a fixed
/// caller-facing reason string and a safe default result.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// Every delivery attempt came back unsuccessful
    #[error("delivery failed after retries")]
    DeliveryFailed { attempts: u32 },
    /// Success status, but no candidate text in the reply
    #[error("response format error")]
    MissingCandidateText,
    /// Candidate text was present but was not valid JSON
    #[error("response format error")]
    MalformedSuggestion(#[source] serde_json::Error),
}

impl SuggestError {
    /// Default result shown in place of a real suggestion
    pub fn fallback_result(&self) -> SuggestionResult {
        let feedback = match self {
            SuggestError::DeliveryFailed { .. } => DELIVERY_ERROR_FEEDBACK,
            SuggestError::MissingCandidateText | SuggestError::MalformedSuggestion(_) => {
                FORMAT_ERROR_FEEDBACK
            }
        };
        SuggestionResult::new(GRADE_UNAVAILABLE, feedback)
    }
}

impl From<SuggestError> for RequestOutcome {
    fn from(err: SuggestError) -> Self {
        RequestOutcome::Failed {
            result: err.fallback_result(),
            reason: err.to_string(),
        }
    }
}
