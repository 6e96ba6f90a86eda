//! Grading sessions
//!
//! Re-models the instructor grading form as plain state: an assignment under
//! review, editable grade/feedback fields, and at most one suggestion request
//! in flight. The session owns the requester's only precondition: no request
//! without submission text.

use log::info;
use thiserror::Error;

use crate::suggest::{
    spawn_suggestion, RequestOutcome, SuggestionHandle, SuggestionRequest, SuggestionRequester,
};

/// Grade placeholder shown while the AI is working
const GRADE_PENDING: &str = "...";
/// Feedback placeholder shown while the AI is working
const FEEDBACK_PENDING: &str = "AI is analyzing the submission...";

/// An assignment as supplied by the surrounding course store.
/// The submission may be absent: students don't always turn work in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub question: String,
    pub submission_text: Option<String>,
}

/// Where accepted grades go. The real implementation updates the course
/// roster; that is out of scope here, so callers supply their own.
pub trait GradeSink {
    fn record_grade(&mut self, course_id: i64, assignment_id: i64, grade: &str, feedback: &str);
}

/// Default sink: log the recorded grade
#[derive(Debug, Default)]
pub struct GradeLog;

impl GradeSink for GradeLog {
    fn record_grade(&mut self, course_id: i64, assignment_id: i64, grade: &str, _feedback: &str) {
        info!(
            "assignment {} in course {} graded: {}",
            assignment_id, course_id, grade
        );
    }
}

/// Submit validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a grade is required before submitting")]
    MissingGrade,
}

/// One instructor-facing grading form over one assignment
#[derive(Debug)]
pub struct GradingSession {
    assignment: Assignment,
    /// Editable grade field; suggestions pre-fill it, the human owns it
    pub grade: String,
    /// Editable feedback field
    pub feedback: String,
    request: Option<SuggestionHandle>,
    last_outcome: Option<RequestOutcome>,
}

impl GradingSession {
    pub fn new(assignment: Assignment) -> Self {
        Self {
            assignment,
            grade: String::new(),
            feedback: String::new(),
            request: None,
            last_outcome: None,
        }
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Latest outcome observed for this session, if any
    pub fn outcome(&self) -> Option<&RequestOutcome> {
        self.last_outcome.as_ref()
    }

    /// Whether a request is currently in flight
    pub fn is_analyzing(&self) -> bool {
        self.request.is_some()
    }

    /// The AI button's enabled state: submission text present and no
    /// request already in flight
    pub fn can_request_suggestion(&self) -> bool {
        if self.request.is_some() {
            return false;
        }
        self.assignment
            .submission_text
            .as_deref()
            .is_some_and(|text| !text.is_empty())
    }

    /// Kick off a suggestion request if the preconditions hold.
    /// Returns whether a request was started.
    pub fn request_suggestion(&mut self, requester: &SuggestionRequester) -> bool {
        if !self.can_request_suggestion() {
            return false;
        }
        let submission = match self.assignment.submission_text.clone() {
            Some(text) => text,
            None => return false,
        };

        self.grade = GRADE_PENDING.to_string();
        self.feedback = FEEDBACK_PENDING.to_string();

        let request = SuggestionRequest::new(self.assignment.question.clone(), submission);
        let handle = spawn_suggestion(requester.clone(), request);
        self.last_outcome = Some(handle.outcome());
        self.request = Some(handle);
        true
    }

    /// Non-blocking poll: absorb the terminal outcome once the request
    /// settles. Returns true when the form fields were updated.
    pub fn refresh(&mut self) -> bool {
        let Some(handle) = &self.request else {
            return false;
        };
        let outcome = handle.outcome();
        if !outcome.is_terminal() {
            return false;
        }
        self.apply_outcome(outcome);
        true
    }

    /// Wait for the in-flight request to settle and absorb it.
    /// Does nothing when no request is in flight.
    pub async fn await_suggestion(&mut self) {
        let Some(handle) = self.request.as_mut() else {
            return;
        };
        let outcome = handle.wait().await;
        self.apply_outcome(outcome);
    }

    fn apply_outcome(&mut self, outcome: RequestOutcome) {
        if let Some(result) = outcome.result() {
            // Failed outcomes still carry displayable defaults, and the
            // fields stay editable either way.
            self.grade = result.grade.clone();
            self.feedback = result.feedback.clone();
        }
        self.last_outcome = Some(outcome);
        self.request = None;
    }

    /// Record the current grade/feedback through the sink.
    /// An empty (or whitespace-only) grade is rejected and nothing is sent.
    pub fn submit(&mut self, sink: &mut dyn GradeSink) -> Result<(), SubmitError> {
        if self.grade.trim().is_empty() {
            return Err(SubmitError::MissingGrade);
        }
        sink.record_grade(
            self.assignment.course_id,
            self.assignment.id,
            &self.grade,
            &self.feedback,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::payload::GenerateContentRequest;
    use crate::suggest::{SuggestionTransport, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts calls; replies with a fixed candidate text
    struct CountingTransport {
        calls: AtomicUsize,
        text: String,
    }

    impl CountingTransport {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                text: text.to_string(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SuggestionTransport for CountingTransport {
        async fn deliver(&self, _body: &GenerateContentRequest) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": self.text }] } }]
            })
            .to_string())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Vec<(i64, i64, String, String)>,
    }

    impl GradeSink for RecordingSink {
        fn record_grade(
            &mut self,
            course_id: i64,
            assignment_id: i64,
            grade: &str,
            feedback: &str,
        ) {
            self.records
                .push((course_id, assignment_id, grade.to_string(), feedback.to_string()));
        }
    }

    fn assignment(submission: Option<&str>) -> Assignment {
        Assignment {
            id: 301,
            course_id: 7,
            title: "Essay 2".to_string(),
            question: "Compare TCP and UDP.".to_string(),
            submission_text: submission.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_missing_submission_never_reaches_the_requester() {
        let transport = CountingTransport::replying(r#"{"grade":"A","feedback":"x"}"#);
        let requester = SuggestionRequester::with_transport(transport.clone());

        for submission in [None, Some("")] {
            let mut session = GradingSession::new(assignment(submission));
            assert!(!session.can_request_suggestion());
            assert!(!session.request_suggestion(&requester));
            assert!(!session.is_analyzing());
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_request_shows_placeholders_then_applies_result() {
        let transport =
            CountingTransport::replying(r#"{"grade":"B+","feedback":"Solid analysis."}"#);
        let requester = SuggestionRequester::with_transport(transport);
        let mut session = GradingSession::new(assignment(Some("TCP is reliable; UDP is not.")));

        assert!(session.request_suggestion(&requester));
        assert!(session.is_analyzing());
        assert_eq!(session.grade, "...");
        assert_eq!(session.feedback, "AI is analyzing the submission...");
        assert_eq!(session.outcome(), Some(&RequestOutcome::Pending));

        session.await_suggestion().await;
        assert!(!session.is_analyzing());
        assert_eq!(session.grade, "B+");
        assert_eq!(session.feedback, "Solid analysis.");
        assert!(matches!(
            session.outcome(),
            Some(RequestOutcome::Succeeded(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_polls_without_blocking() {
        let transport = CountingTransport::replying(r#"{"grade":"A-","feedback":"Good."}"#);
        let requester = SuggestionRequester::with_transport(transport);
        let mut session = GradingSession::new(assignment(Some("text")));
        session.request_suggestion(&requester);

        // Nothing has run yet: refresh sees Pending and leaves placeholders
        assert!(!session.refresh());
        assert_eq!(session.grade, GRADE_PENDING);

        while !session.refresh() {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.grade, "A-");
        assert!(!session.is_analyzing());
    }

    #[tokio::test]
    async fn test_no_second_request_while_one_is_in_flight() {
        let transport = CountingTransport::replying(r#"{"grade":"A","feedback":"x"}"#);
        let requester = SuggestionRequester::with_transport(transport.clone());
        let mut session = GradingSession::new(assignment(Some("text")));

        assert!(session.request_suggestion(&requester));
        assert!(!session.can_request_suggestion());
        assert!(!session.request_suggestion(&requester));

        session.await_suggestion().await;
        // Settled: the form may ask again, on a fresh outcome
        assert!(session.can_request_suggestion());
        assert!(session.request_suggestion(&requester));
        session.await_suggestion().await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_fills_defaults_and_keeps_fields_editable() {
        struct EmptyReply;

        #[async_trait]
        impl SuggestionTransport for EmptyReply {
            async fn deliver(
                &self,
                _body: &GenerateContentRequest,
            ) -> Result<String, TransportError> {
                Ok("{}".to_string())
            }
        }

        let requester = SuggestionRequester::with_transport(Arc::new(EmptyReply));
        let mut session = GradingSession::new(assignment(Some("text")));
        session.request_suggestion(&requester);
        session.await_suggestion().await;

        assert_eq!(session.grade, "N/A");
        assert_eq!(session.feedback, "AI response format error. Could not parse.");
        assert!(matches!(
            session.outcome(),
            Some(RequestOutcome::Failed { .. })
        ));

        // The human can still override and record
        session.grade = "B-".to_string();
        session.feedback = "Partial credit for the comparison.".to_string();
        let mut sink = RecordingSink::default();
        session.submit(&mut sink).unwrap();
        assert_eq!(
            sink.records,
            vec![(
                7,
                301,
                "B-".to_string(),
                "Partial credit for the comparison.".to_string()
            )]
        );
    }

    #[test]
    fn test_submit_rejects_empty_grade() {
        let mut session = GradingSession::new(assignment(Some("text")));
        let mut sink = RecordingSink::default();
        assert_eq!(session.submit(&mut sink), Err(SubmitError::MissingGrade));

        session.grade = "   ".to_string();
        assert_eq!(session.submit(&mut sink), Err(SubmitError::MissingGrade));
        assert!(sink.records.is_empty());
    }

    #[test]
    fn test_submit_records_once_with_session_values() {
        let mut session = GradingSession::new(assignment(Some("text")));
        session.grade = "92%".to_string();
        session.feedback = "Strong work.".to_string();
        let mut sink = RecordingSink::default();
        session.submit(&mut sink).unwrap();
        assert_eq!(
            sink.records,
            vec![(7, 301, "92%".to_string(), "Strong work.".to_string())]
        );
    }
}
